use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("Source PDF not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unsupported PDF version {found} (maximum supported is {max})")]
    UnsupportedPdfVersion { found: String, max: String },

    #[error("Malformed annotation object: {0}")]
    MalformedAnnotationObject(String),

    #[error("Unsupported color format: {0:?}")]
    UnsupportedColorFormat(String),

    #[error("PDF composition failed: {0}")]
    CompositionFailure(String),

    #[error("Annotated file is too big: {size} bytes (limit {limit} bytes)")]
    OutputTooLarge { size: u64, limit: u64 },

    #[error("Annotated file is empty")]
    EmptyOutput,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<lopdf::Error> for AnnotatorError {
    fn from(e: lopdf::Error) -> Self {
        AnnotatorError::CompositionFailure(e.to_string())
    }
}

impl From<serde_json::Error> for AnnotatorError {
    fn from(e: serde_json::Error) -> Self {
        AnnotatorError::MalformedAnnotationObject(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnnotatorError>;
