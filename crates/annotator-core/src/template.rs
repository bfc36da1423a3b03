//! Source page templates
//!
//! A source page is turned into a Form XObject holding the page's content
//! and resources. The template can then be painted onto a fresh destination
//! page, with new annotation content drawn on top of it.
//!
//! The algorithm:
//! 1. Copy every object of the source document into the destination,
//!    offsetting object IDs so they cannot clash
//! 2. For each source page, resolve its (inheritable) page box, rotation and
//!    resources through the page tree
//! 3. Wrap the decoded page content in a Form XObject whose matrix folds the
//!    rotation in, so the template's displayed size is its width/height

use crate::error::{AnnotatorError, Result};
use crate::model::Orientation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// A4 in points, used when a page declares no usable page box
const A4_PORTRAIT: (f64, f64) = (595.28, 841.89);

/// Guard against cyclic Parent chains in broken page trees
const MAX_TREE_DEPTH: usize = 64;

/// A reusable rendering of one source page
#[derive(Debug, Clone, PartialEq)]
pub struct PageTemplate {
    pub page_number: u32,
    pub xobject_id: ObjectId,
    /// Displayed width in points
    pub width: f64,
    /// Displayed height in points
    pub height: f64,
    pub orientation: Orientation,
}

impl PageTemplate {
    /// Resource name used when the template is painted on a page
    pub fn resource_name(&self) -> String {
        format!("Tpl{}", self.page_number)
    }
}

/// Copy all objects of `source` into `dest` and return the source pages in
/// order, with their IDs as they now appear in `dest`
pub fn import_source(dest: &mut Document, source: Document) -> Vec<ObjectId> {
    let offset = dest.max_id;
    let pages: Vec<ObjectId> = source
        .get_pages()
        .values()
        .map(|id| (id.0 + offset, id.1))
        .collect();

    for (id, object) in source.objects.into_iter() {
        dest.objects
            .insert((id.0 + offset, id.1), remap_object_refs(object, offset));
    }
    dest.max_id = dest.max_id.max(source.max_id + offset);

    pages
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(dict: Dictionary, offset: u32) -> Dictionary {
    let mut remapped = Dictionary::new();
    for (key, value) in dict.into_iter() {
        remapped.set(key.clone(), remap_object_refs(value.clone(), offset));
    }
    remapped
}

/// Turn an (imported) page into a Form XObject stored in `doc`
pub fn import_page(
    doc: &mut Document,
    page_number: u32,
    page_id: ObjectId,
    fallback: Orientation,
) -> Result<PageTemplate> {
    let page_box = inherited(doc, page_id, b"CropBox")
        .and_then(|obj| rectangle(doc, obj))
        .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|obj| rectangle(doc, obj)))
        .unwrap_or_else(|| {
            tracing::warn!(page = page_number, "page has no usable page box, using A4");
            let (w, h) = match fallback {
                Orientation::Portrait => A4_PORTRAIT,
                Orientation::Landscape => (A4_PORTRAIT.1, A4_PORTRAIT.0),
            };
            [0.0, 0.0, w, h]
        });

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .map(|r| r.rem_euclid(360))
        .filter(|r| r % 90 == 0)
        .unwrap_or(0);

    let resources = inherited(doc, page_id, b"Resources").cloned();
    let content = page_content(doc, page_id)?;

    let [llx, lly, urx, ury] = page_box;
    let (box_w, box_h) = (urx - llx, ury - lly);
    // maps the page box onto (0,0)-(width,height) in displayed orientation
    let (matrix, width, height) = match rotation {
        90 => ([0.0, -1.0, 1.0, 0.0, -lly, urx], box_h, box_w),
        180 => ([-1.0, 0.0, 0.0, -1.0, urx, ury], box_w, box_h),
        270 => ([0.0, 1.0, -1.0, 0.0, ury, -llx], box_h, box_w),
        _ => ([1.0, 0.0, 0.0, 1.0, -llx, -lly], box_w, box_h),
    };

    let mut form = Dictionary::new();
    form.set("Type", Object::Name(b"XObject".to_vec()));
    form.set("Subtype", Object::Name(b"Form".to_vec()));
    form.set("FormType", Object::Integer(1));
    form.set("BBox", Object::Array(page_box.iter().map(|v| real(*v)).collect()));
    form.set("Matrix", Object::Array(matrix.iter().map(|v| real(*v)).collect()));
    if let Some(resources) = resources {
        form.set("Resources", resources);
    }

    let xobject_id = doc.add_object(Object::Stream(Stream::new(form, content)));
    let orientation = if width > height {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };

    Ok(PageTemplate {
        page_number,
        xobject_id,
        width,
        height,
        orientation,
    })
}

/// Look up a page attribute, walking up the page tree for inherited values
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Read a page box, normalizing it so the lower-left corner comes first
fn rectangle(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let values: Vec<f64> = resolve(doc, obj)
        .as_array()
        .ok()?
        .iter()
        .map(|v| number(resolve(doc, v)))
        .collect::<Option<_>>()?;
    if values.len() != 4 {
        return None;
    }
    let rect = [
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ];
    if rect[2] - rect[0] <= 0.0 || rect[3] - rect[1] <= 0.0 {
        return None;
    }
    Some(rect)
}

/// Decoded content of all the page's content streams, joined by newlines
fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| AnnotatorError::CompositionFailure(format!("Invalid page object: {}", e)))?;

    let streams: Vec<&Object> = match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.iter().map(|o| resolve(doc, o)).collect(),
        Ok(obj) => match resolve(doc, obj) {
            Object::Array(items) => items.iter().map(|o| resolve(doc, o)).collect(),
            single => vec![single],
        },
        Err(_) => Vec::new(),
    };

    let mut content = Vec::new();
    for obj in streams {
        let Object::Stream(stream) = obj else {
            continue;
        };
        let data = if stream.dict.has(b"Filter") {
            stream.decompressed_content().map_err(|e| {
                AnnotatorError::CompositionFailure(format!("Cannot decode page content: {}", e))
            })?
        } else {
            stream.content.clone()
        };
        content.extend_from_slice(&data);
        content.push(b'\n');
    }
    Ok(content)
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}
