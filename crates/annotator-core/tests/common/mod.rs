//! Shared helpers for building test PDFs in memory

#![allow(dead_code)]

use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Create a PDF with `num_pages` pages of `width` x `height` points, each
/// holding an identifiable text line
pub fn create_test_pdf(num_pages: u32, version: &str, width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version(version);
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for page_num in 0..num_pages {
        let content = format!("BT /F1 12 Tf 50 700 Td (Page-{}) Tj ET", page_num + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
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
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
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

pub fn letter_pdf(num_pages: u32) -> Vec<u8> {
    create_test_pdf(num_pages, "1.4", 612, 792)
}

pub fn number(obj: &Object) -> f64 {
    match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => *r as f64,
        other => panic!("expected a number, got {:?}", other),
    }
}

/// Pages of a serialized document, in order
pub fn pages(bytes: &[u8]) -> (Document, Vec<ObjectId>) {
    let doc = Document::load_mem(bytes).unwrap();
    let ids = doc.get_pages().values().copied().collect();
    (doc, ids)
}

pub fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f64> {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(number)
        .collect()
}

pub fn page_content(doc: &Document, page_id: ObjectId) -> Content {
    Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap()
}

pub fn operators(doc: &Document, page_id: ObjectId) -> Vec<String> {
    page_content(doc, page_id)
        .operations
        .into_iter()
        .map(|op| op.operator)
        .collect()
}
