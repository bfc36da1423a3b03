//! Canvas annotation overlay for PDF documents
//!
//! This crate draws annotations captured by a browser canvas editor
//! (freehand paths, text and highlight rectangles in the Fabric.js object
//! model) on top of an existing PDF, producing a new document.
//!
//! Each source page is imported as a Form XObject template, stamped onto a
//! fresh page of the same size, and the page's canvas objects are drawn over
//! it in order.
//!
//! ```no_run
//! use annotator_core::{build_annotated_document, AnnotationDocument};
//! use std::path::Path;
//!
//! let annotations = AnnotationDocument::from_json(r#"{"pages": []}"#)?;
//! let mut doc = build_annotated_document(Path::new("in.pdf"), &annotations)?;
//! doc.save(Path::new("out.pdf"))?;
//! # Ok::<(), annotator_core::AnnotatorError>(())
//! ```

pub mod assemble;
pub mod color;
pub mod compose;
pub mod draw;
pub mod error;
pub mod model;
pub mod options;
pub mod parse;
pub mod publish;
pub mod render;
pub mod source;
pub mod template;

pub use assemble::{build_annotated_document, AnnotatedDocument, DocumentAssembler};
pub use color::{decode_color, ColorPolicy, Rgb};
pub use compose::{ComposedPage, PageCompositor};
pub use draw::PageDrawContext;
pub use error::{AnnotatorError, Result};
pub use model::{AnnotationDocument, CanvasObject, Orientation, PageAnnotations};
pub use options::{FontFamily, PdfVersion, RenderOptions, UnknownObjectPolicy, Unit};
pub use parse::{parse_path, parse_rectangle, parse_text, PathShape, Point, RectShape, TextShape};
pub use publish::{
    prepare_upload, publish_annotated, DirectoryStore, FileRecord, FileStore, RequireCompatible,
    UploadLimits, VersionNormalizer,
};
pub use render::{AnnotationRenderer, RenderOutcome};
pub use source::detect_version;
pub use template::PageTemplate;
