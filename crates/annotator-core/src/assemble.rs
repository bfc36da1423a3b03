//! Whole-document assembly
//!
//! The algorithm:
//! 1. Read the source and reject versions above the configured maximum
//! 2. Copy every source object into a fresh destination document
//! 3. Compose one destination page per source page, in order
//! 4. Build a new page tree and catalog, drop what is no longer
//!    reachable, then compress

use crate::compose::PageCompositor;
use crate::error::{AnnotatorError, Result};
use crate::model::{AnnotationDocument, Orientation};
use crate::options::{PdfVersion, RenderOptions};
use crate::source::{check_version, parse_source, read_source};
use crate::template::import_source;
use lopdf::{Dictionary, Document, Object};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Output documents are never declared below this version (ExtGState alpha)
const MIN_OUTPUT_VERSION: PdfVersion = PdfVersion::V1_4;

/// Build an annotated copy of `source_pdf_path` with default options
pub fn build_annotated_document(
    source_pdf_path: &Path,
    annotations: &AnnotationDocument,
) -> Result<AnnotatedDocument> {
    DocumentAssembler::default().build(source_pdf_path, annotations)
}

#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    options: RenderOptions,
}

impl DocumentAssembler {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Annotate the PDF at `path`. A file that cannot be read or parsed is
    /// reported as `SourceNotFound`.
    pub fn build(&self, path: &Path, annotations: &AnnotationDocument) -> Result<AnnotatedDocument> {
        let bytes = read_source(path)?;
        let version = check_version(&bytes, self.options.max_pdf_version)?;
        let source = Document::load_mem(&bytes).map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "cannot parse source PDF");
            AnnotatorError::SourceNotFound(path.to_path_buf())
        })?;
        self.assemble(source, version, annotations)
    }

    /// Annotate an in-memory PDF
    pub fn build_from_bytes(
        &self,
        bytes: &[u8],
        annotations: &AnnotationDocument,
    ) -> Result<AnnotatedDocument> {
        let version = check_version(bytes, self.options.max_pdf_version)?;
        let source = parse_source(bytes)?;
        self.assemble(source, version, annotations)
    }

    fn assemble(
        &self,
        source: Document,
        source_version: Option<PdfVersion>,
        annotations: &AnnotationDocument,
    ) -> Result<AnnotatedDocument> {
        let start = Instant::now();
        let orientation = annotations.page_setup.orientation;
        let version = source_version
            .unwrap_or(MIN_OUTPUT_VERSION)
            .max(MIN_OUTPUT_VERSION);

        let mut doc = Document::with_version(version.to_string());
        let pages_id = doc.new_object_id();
        let source_pages = import_source(&mut doc, source);
        if source_pages.is_empty() {
            return Err(AnnotatorError::CompositionFailure(
                "Source PDF has no pages".into(),
            ));
        }
        if annotations.pages.len() > source_pages.len() {
            tracing::warn!(
                annotated = annotations.pages.len(),
                source = source_pages.len(),
                "ignoring annotations for pages beyond the end of the source"
            );
        }

        let compositor = PageCompositor::new(&self.options, orientation);
        let mut kids = Vec::with_capacity(source_pages.len());
        for (index, source_page) in source_pages.iter().enumerate() {
            let page_number = index as u32 + 1;
            let composed = compositor.compose(
                &mut doc,
                pages_id,
                page_number,
                *source_page,
                annotations.objects_for_page(page_number),
            )?;
            kids.push(Object::Reference(composed.page_id));
        }

        let page_count = kids.len() as u32;
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(page_count as i64));
        pages.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        // the source catalog, page tree and pages are unreachable now
        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();

        tracing::info!(
            pages = page_count,
            version = %version,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "annotated document assembled"
        );

        Ok(AnnotatedDocument {
            document: doc,
            page_count,
            orientation,
            version,
        })
    }
}

/// The composed output, ready to be serialized
#[derive(Debug)]
pub struct AnnotatedDocument {
    document: Document,
    page_count: u32,
    orientation: Orientation,
    version: PdfVersion,
}

impl AnnotatedDocument {
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Orientation requested by the editor for the whole document
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_inner(self) -> Document {
        self.document
    }

    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.document.save_to(target).map_err(|e| {
            AnnotatorError::CompositionFailure(format!("Failed to serialize PDF: {}", e))
        })
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.save_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| {
            AnnotatorError::CompositionFailure(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn create_test_pdf(num_pages: u32, version: &str) -> Vec<u8> {
        let mut doc = Document::with_version(version);
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for page_num in 0..num_pages {
            let content = format!("BT /F1 12 Tf 50 700 Td (Page-{}) Tj ET", page_num + 1);
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_page_count_preserved_without_annotations() {
        let pdf = create_test_pdf(3, "1.4");
        let mut out = DocumentAssembler::default()
            .build_from_bytes(&pdf, &AnnotationDocument::default())
            .unwrap();
        assert_eq!(out.page_count(), 3);

        let reparsed = Document::load_mem(&out.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed.get_pages().len(), 3);
    }

    #[test]
    fn test_output_version_never_below_1_4() {
        let pdf = create_test_pdf(1, "1.3");
        let out = DocumentAssembler::default()
            .build_from_bytes(&pdf, &AnnotationDocument::default())
            .unwrap();
        assert_eq!(out.version(), PdfVersion::V1_4);
    }

    #[test]
    fn test_newer_version_rejected() {
        let pdf = create_test_pdf(1, "1.7");
        let err = DocumentAssembler::default()
            .build_from_bytes(&pdf, &AnnotationDocument::default())
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::UnsupportedPdfVersion { .. }));
    }

    #[test]
    fn test_newer_version_allowed_when_configured() {
        let pdf = create_test_pdf(1, "1.7");
        let options = RenderOptions {
            max_pdf_version: PdfVersion::new(1, 7),
            ..RenderOptions::default()
        };
        let out = DocumentAssembler::new(options)
            .build_from_bytes(&pdf, &AnnotationDocument::default())
            .unwrap();
        assert_eq!(out.version(), PdfVersion::new(1, 7));
    }

    #[test]
    fn test_unparseable_bytes() {
        let err = DocumentAssembler::default()
            .build_from_bytes(b"%PDF-1.4\nnot really", &AnnotationDocument::default())
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::CompositionFailure(_)));
    }

    #[test]
    fn test_orientation_recorded() {
        let pdf = create_test_pdf(1, "1.4");
        let annotations =
            AnnotationDocument::from_json(r#"{"page_setup": {"orientation": "l"}, "pages": []}"#)
                .unwrap();
        let out = DocumentAssembler::default()
            .build_from_bytes(&pdf, &annotations)
            .unwrap();
        assert_eq!(out.orientation(), Orientation::Landscape);
    }

    #[test]
    fn test_surplus_annotation_pages_ignored() {
        let pdf = create_test_pdf(1, "1.4");
        let annotations = AnnotationDocument::from_json(
            r#"{"pages": [[], [{"objects": [{"type": "rect", "left": 1, "top": 1, "width": 2, "height": 2}]}]]}"#,
        )
        .unwrap();
        let out = DocumentAssembler::default()
            .build_from_bytes(&pdf, &annotations)
            .unwrap();
        assert_eq!(out.page_count(), 1);
    }
}
