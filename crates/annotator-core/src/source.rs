//! Loading and version-checking source PDFs

use crate::error::{AnnotatorError, Result};
use crate::options::PdfVersion;
use lopdf::Document;
use std::path::Path;

/// How far into the file the `%PDF-x.y` header may appear
const HEADER_SCAN_LIMIT: usize = 1024;

/// Read the `major.minor` version declared in the file header. Anything
/// after the minor digits (`%PDF-1.4.2`, `%PDF-1.7x`) is ignored.
pub fn detect_version(bytes: &[u8]) -> Option<PdfVersion> {
    let window = &bytes[..bytes.len().min(HEADER_SCAN_LIMIT)];
    let start = window.windows(5).position(|w| w == b"%PDF-")? + 5;
    let rest = &window[start..];

    let major_len = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let minor = rest.get(major_len + 1..)?;
    let minor_len = minor.iter().take_while(|b| b.is_ascii_digit()).count();
    if major_len == 0 || rest[major_len] != b'.' || minor_len == 0 {
        return None;
    }

    let major = std::str::from_utf8(&rest[..major_len]).ok()?.parse().ok()?;
    let minor = std::str::from_utf8(&minor[..minor_len]).ok()?.parse().ok()?;
    Some(PdfVersion::new(major, minor))
}

/// Fail when the declared version is newer than `max`. Files without a
/// readable header are left for the parser to judge.
pub fn check_version(bytes: &[u8], max: PdfVersion) -> Result<Option<PdfVersion>> {
    match detect_version(bytes) {
        Some(found) if found > max => Err(AnnotatorError::UnsupportedPdfVersion {
            found: found.to_string(),
            max: max.to_string(),
        }),
        found => Ok(found),
    }
}

/// Read a source PDF from disk. Unreadable files are reported as not found.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "cannot read source PDF");
        AnnotatorError::SourceNotFound(path.to_path_buf())
    })
}

pub fn parse_source(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes)
        .map_err(|e| AnnotatorError::CompositionFailure(format!("Failed to parse PDF: {}", e)))
}
