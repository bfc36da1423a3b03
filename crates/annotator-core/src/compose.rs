//! Per-page composition: template stamp plus annotation objects

use crate::draw::PageDrawContext;
use crate::error::Result;
use crate::model::{CanvasObject, Orientation};
use crate::options::RenderOptions;
use crate::render::{AnnotationRenderer, RenderOutcome};
use crate::template::{import_page, PageTemplate};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Summary of one composed destination page
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPage {
    pub page_id: ObjectId,
    pub template: PageTemplate,
    pub drawn: usize,
    pub skipped: usize,
}

pub struct PageCompositor<'a> {
    options: &'a RenderOptions,
    fallback: Orientation,
}

impl<'a> PageCompositor<'a> {
    pub fn new(options: &'a RenderOptions, fallback: Orientation) -> Self {
        Self { options, fallback }
    }

    /// Build destination page `page_number` from the imported source page
    /// `source_page` and attach it under `parent`
    pub fn compose(
        &self,
        doc: &mut Document,
        parent: ObjectId,
        page_number: u32,
        source_page: ObjectId,
        objects: &[CanvasObject],
    ) -> Result<ComposedPage> {
        let template = import_page(doc, page_number, source_page, self.fallback)?;
        let mut ctx = PageDrawContext::new(template.width, template.height, self.options.unit);

        let (offset_x, offset_y) = self.options.template_offset;
        ctx.stamp_xobject(
            &template.resource_name(),
            template.xobject_id,
            offset_x,
            offset_y,
        );

        let mut drawn = 0;
        let mut skipped = 0;
        if !objects.is_empty() {
            let renderer = AnnotationRenderer::new(self.options);
            for (index, object) in objects.iter().enumerate() {
                tracing::debug!(page = page_number, index, kind = object.kind(), "rendering object");
                match renderer.render(object, &mut ctx)? {
                    RenderOutcome::Drawn => drawn += 1,
                    RenderOutcome::Skipped => skipped += 1,
                }
            }
        }

        let (content, resources) = ctx.finish()?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(parent));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(template.width as f32),
                Object::Real(template.height as f32),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        let page_id = doc.add_object(page);

        tracing::debug!(
            page = page_number,
            width = template.width,
            height = template.height,
            drawn,
            skipped,
            "composed page"
        );

        Ok(ComposedPage {
            page_id,
            template,
            drawn,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotatorError;
    use crate::model::AnnotationDocument;
    use crate::options::Unit;
    use lopdf::content::Content;
    use lopdf::dictionary;

    fn source_page(doc: &mut Document) -> ObjectId {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 5 5 l S".to_vec()));
        doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        })
    }

    fn operators(doc: &Document, page_id: ObjectId) -> Vec<String> {
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let content_id = page.get(b"Contents").unwrap().as_reference().unwrap();
        let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
        Content::decode(&stream.content)
            .unwrap()
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect()
    }

    fn options() -> RenderOptions {
        RenderOptions {
            unit: Unit::Point,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn test_empty_page_is_stamp_only() {
        let opts = options();
        let mut doc = Document::with_version("1.4");
        let parent = doc.new_object_id();
        let src = source_page(&mut doc);

        let composed = PageCompositor::new(&opts, Orientation::Portrait)
            .compose(&mut doc, parent, 1, src, &[])
            .unwrap();

        assert_eq!(operators(&doc, composed.page_id), vec!["q", "cm", "Do", "Q"]);
        assert_eq!(composed.drawn, 0);

        let page = doc.get_object(composed.page_id).unwrap().as_dict().unwrap();
        let xobjects = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"XObject"))
            .and_then(Object::as_dict)
            .unwrap();
        assert_eq!(
            xobjects.get(b"Tpl1").unwrap().as_reference().unwrap(),
            composed.template.xobject_id
        );
    }

    #[test]
    fn test_objects_drawn_after_stamp() {
        let opts = options();
        let mut doc = Document::with_version("1.4");
        let parent = doc.new_object_id();
        let src = source_page(&mut doc);
        let annotations = AnnotationDocument::from_json(
            r#"{"pages": [[{"objects": [
                {"type": "rect", "left": 10, "top": 10, "width": 50, "height": 20, "fill": "black"},
                {"type": "triangle"}
            ]}]]}"#,
        )
        .unwrap();

        let composed = PageCompositor::new(&opts, Orientation::Portrait)
            .compose(&mut doc, parent, 1, src, annotations.objects_for_page(1))
            .unwrap();

        let ops = operators(&doc, composed.page_id);
        assert_eq!(&ops[..4], &["q", "cm", "Do", "Q"]);
        assert!(ops.contains(&"re".to_string()));
        assert_eq!((composed.drawn, composed.skipped), (1, 1));
    }

    #[test]
    fn test_object_error_fails_page() {
        let opts = options();
        let mut doc = Document::with_version("1.4");
        let parent = doc.new_object_id();
        let src = source_page(&mut doc);
        let annotations = AnnotationDocument::from_json(
            r#"{"pages": [{"objects": [{"type": "i-text", "left": 0, "top": 0, "height": 1, "fontSize": 10, "text": "x", "fill": "not-a-color"}]}]}"#,
        )
        .unwrap();

        let result = PageCompositor::new(&opts, Orientation::Portrait).compose(
            &mut doc,
            parent,
            1,
            src,
            annotations.objects_for_page(1),
        );
        assert!(matches!(result, Err(AnnotatorError::UnsupportedColorFormat(_))));
    }
}
