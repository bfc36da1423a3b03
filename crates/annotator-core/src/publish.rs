//! Publishing annotated documents to a file store
//!
//! `publish_annotated` runs the full upload flow: version normalization,
//! assembly, serialization, size check and storage. `prepare_upload` stops
//! before storage so callers can bound the work and write afterwards. The version
//! normalization and storage steps are traits so callers can plug in a
//! converter or a different backing store.

use crate::assemble::DocumentAssembler;
use crate::error::{AnnotatorError, Result};
use crate::model::AnnotationDocument;
use crate::options::PdfVersion;
use crate::source::{check_version, read_source};
use std::path::{Component, Path, PathBuf};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Brings a source PDF to a version the assembler accepts
pub trait VersionNormalizer {
    /// Returns the path of a compatible file, which may be `source` itself
    fn normalize(&self, source: &Path) -> Result<PathBuf>;
}

/// Performs no conversion: compatible files pass through, newer ones fail
#[derive(Debug, Clone, Copy)]
pub struct RequireCompatible {
    pub max_version: PdfVersion,
}

impl Default for RequireCompatible {
    fn default() -> Self {
        Self {
            max_version: PdfVersion::V1_4,
        }
    }
}

impl VersionNormalizer for RequireCompatible {
    fn normalize(&self, source: &Path) -> Result<PathBuf> {
        let bytes = read_source(source)?;
        check_version(&bytes, self.max_version)?;
        Ok(source.to_path_buf())
    }
}

/// Storage key of a published file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub context_id: u64,
    pub component: String,
    pub area: String,
    pub item_id: u64,
    pub path: String,
    pub name: String,
}

impl FileRecord {
    /// Record in the default response attachment area
    pub fn new(context_id: u64, item_id: u64, name: impl Into<String>) -> Self {
        Self {
            context_id,
            component: "question".to_string(),
            area: "response_attachments".to_string(),
            item_id,
            path: "/".to_string(),
            name: name.into(),
        }
    }
}

pub trait FileStore {
    /// Store `bytes` under `record`, replacing any existing file
    fn store(&self, record: &FileRecord, bytes: &[u8]) -> Result<()>;
}

/// Stores files as `root/context/component/area/item/path/name`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of `record` under the store root
    pub fn location(&self, record: &FileRecord) -> Result<PathBuf> {
        let mut location = self.root.join(record.context_id.to_string());
        location.push(safe_segment(&record.component)?);
        location.push(safe_segment(&record.area)?);
        location.push(record.item_id.to_string());
        for segment in record.path.split('/').filter(|s| !s.is_empty()) {
            location.push(safe_segment(segment)?);
        }
        location.push(safe_segment(&record.name)?);
        Ok(location)
    }
}

impl FileStore for DirectoryStore {
    fn store(&self, record: &FileRecord, bytes: &[u8]) -> Result<()> {
        let location = self.location(record)?;
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AnnotatorError::Storage(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(&location, bytes).map_err(|e| {
            AnnotatorError::Storage(format!("Cannot write {}: {}", location.display(), e))
        })?;
        tracing::debug!(path = %location.display(), size = bytes.len(), "stored file");
        Ok(())
    }
}

/// A single normal path component: no separators, no `.` or `..`
fn safe_segment(segment: &str) -> Result<&str> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(segment),
        _ => Err(AnnotatorError::Storage(format!(
            "Invalid storage path segment: {:?}",
            segment
        ))),
    }
}

/// Size limits for stored files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub upload_max_mb: u64,
    pub post_max_mb: u64,
    pub memory_limit_mb: u64,
    /// Site-wide cap in bytes; zero means no cap
    pub site_max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            upload_max_mb: 2,
            post_max_mb: 8,
            memory_limit_mb: 128,
            site_max_bytes: 0,
        }
    }
}

impl UploadLimits {
    pub fn max_bytes(&self) -> u64 {
        let max_mb = self
            .upload_max_mb
            .min(self.post_max_mb)
            .min(self.memory_limit_mb);
        let max = max_mb.saturating_mul(BYTES_PER_MB);
        if self.site_max_bytes > 0 {
            max.min(self.site_max_bytes)
        } else {
            max
        }
    }

    /// Accept only `0 < size < max_bytes()`
    pub fn check(&self, size: u64) -> Result<()> {
        let limit = self.max_bytes();
        if size == 0 {
            return Err(AnnotatorError::EmptyOutput);
        }
        if size >= limit {
            return Err(AnnotatorError::OutputTooLarge { size, limit });
        }
        Ok(())
    }
}

/// Annotate `source` and serialize the result, failing when it does not fit
/// `limits`. Nothing is written; the bytes are ready for `FileStore::store`.
pub fn prepare_upload(
    normalizer: &dyn VersionNormalizer,
    assembler: &DocumentAssembler,
    source: &Path,
    annotations: &AnnotationDocument,
    limits: &UploadLimits,
) -> Result<Vec<u8>> {
    let compatible = normalizer.normalize(source)?;
    let mut document = assembler.build(&compatible, annotations)?;
    let bytes = document.to_bytes()?;
    limits.check(bytes.len() as u64)?;
    Ok(bytes)
}

/// Annotate `source`, check the result against `limits` and store it.
/// Returns the stored size in bytes.
pub fn publish_annotated(
    normalizer: &dyn VersionNormalizer,
    assembler: &DocumentAssembler,
    source: &Path,
    annotations: &AnnotationDocument,
    limits: &UploadLimits,
    store: &dyn FileStore,
    record: &FileRecord,
) -> Result<u64> {
    let bytes = prepare_upload(normalizer, assembler, source, annotations, limits)?;
    let size = bytes.len() as u64;
    store.store(record, &bytes)?;

    tracing::info!(
        context = record.context_id,
        item = record.item_id,
        name = record.name.as_str(),
        size,
        "published annotated document"
    );
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemoryStore {
        files: RefCell<Vec<(FileRecord, usize)>>,
    }

    impl FileStore for MemoryStore {
        fn store(&self, record: &FileRecord, bytes: &[u8]) -> Result<()> {
            self.files.borrow_mut().push((record.clone(), bytes.len()));
            Ok(())
        }
    }

    fn write_source(dir: &TempDir, header: &str) -> PathBuf {
        use lopdf::{dictionary, Dictionary, Document, Object, Stream};

        let mut doc = Document::with_version(header);
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let path = dir.path().join("source.pdf");
        doc.save(&path).unwrap();
        path
    }

    #[test]
    fn test_max_bytes_uses_smallest_limit() {
        let limits = UploadLimits {
            upload_max_mb: 2,
            post_max_mb: 8,
            memory_limit_mb: 128,
            site_max_bytes: 0,
        };
        assert_eq!(limits.max_bytes(), 2 * 1024 * 1024);

        let capped = UploadLimits {
            site_max_bytes: 1000,
            ..limits
        };
        assert_eq!(capped.max_bytes(), 1000);
    }

    #[test]
    fn test_check_bounds() {
        let limits = UploadLimits {
            site_max_bytes: 100,
            ..UploadLimits::default()
        };
        assert!(matches!(limits.check(0), Err(AnnotatorError::EmptyOutput)));
        assert!(limits.check(99).is_ok());
        assert!(matches!(
            limits.check(100),
            Err(AnnotatorError::OutputTooLarge { size: 100, limit: 100 })
        ));
    }

    #[test]
    fn test_directory_store_layout_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());
        let record = FileRecord::new(12, 34, "marked.pdf");

        store.store(&record, b"first").unwrap();
        store.store(&record, b"second").unwrap();

        let expected = dir
            .path()
            .join("12/question/response_attachments/34/marked.pdf");
        assert_eq!(store.location(&record).unwrap(), expected);
        assert_eq!(std::fs::read(expected).unwrap(), b"second".to_vec());
    }

    #[test]
    fn test_directory_store_rejects_traversal() {
        let store = DirectoryStore::new("/tmp/store");
        let record = FileRecord::new(1, 1, "../escape.pdf");
        assert!(matches!(
            store.location(&record),
            Err(AnnotatorError::Storage(_))
        ));
    }

    #[test]
    fn test_require_compatible() {
        let dir = TempDir::new().unwrap();
        let ok = write_source(&dir, "1.4");
        assert_eq!(RequireCompatible::default().normalize(&ok).unwrap(), ok);

        let newer = write_source(&dir, "1.6");
        assert!(matches!(
            RequireCompatible::default().normalize(&newer),
            Err(AnnotatorError::UnsupportedPdfVersion { .. })
        ));
    }

    #[test]
    fn test_publish_stores_annotated_file() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "1.4");
        let annotations = AnnotationDocument::from_json(
            r#"{"pages": [[{"objects": [{"type": "rect", "left": 10, "top": 10, "width": 50, "height": 20, "fill": "yellow"}]}]]}"#,
        )
        .unwrap();
        let store = MemoryStore::default();
        let record = FileRecord::new(5, 9, "out.pdf");

        let size = publish_annotated(
            &RequireCompatible::default(),
            &DocumentAssembler::default(),
            &source,
            &annotations,
            &UploadLimits::default(),
            &store,
            &record,
        )
        .unwrap();

        let files = store.files.borrow();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, record);
        assert_eq!(files[0].1 as u64, size);
    }

    #[test]
    fn test_prepare_upload_returns_checked_bytes() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "1.4");

        let bytes = prepare_upload(
            &RequireCompatible::default(),
            &DocumentAssembler::default(),
            &source,
            &AnnotationDocument::default(),
            &UploadLimits::default(),
        )
        .unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let tight = UploadLimits {
            site_max_bytes: 10,
            ..UploadLimits::default()
        };
        let result = prepare_upload(
            &RequireCompatible::default(),
            &DocumentAssembler::default(),
            &source,
            &AnnotationDocument::default(),
            &tight,
        );
        assert!(matches!(result, Err(AnnotatorError::OutputTooLarge { .. })));
    }

    #[test]
    fn test_publish_rejects_oversized_output() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "1.4");
        let store = MemoryStore::default();
        let limits = UploadLimits {
            site_max_bytes: 10,
            ..UploadLimits::default()
        };

        let result = publish_annotated(
            &RequireCompatible::default(),
            &DocumentAssembler::default(),
            &source,
            &AnnotationDocument::default(),
            &limits,
            &store,
            &FileRecord::new(1, 1, "out.pdf"),
        );
        assert!(matches!(result, Err(AnnotatorError::OutputTooLarge { .. })));
        assert!(store.files.borrow().is_empty());
    }
}
