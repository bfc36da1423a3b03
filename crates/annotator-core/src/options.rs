//! Rendering configuration
//!
//! The defaults reproduce the editor's calibration: millimetre document
//! units, a 0.5 unit brush, Times text scaled down by 1.6 and 30% opaque
//! highlights, with templates stamped 1 unit from the top-left corner.

use crate::color::ColorPolicy;
use crate::error::{AnnotatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit used by annotation coordinates and template offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Point,
    #[default]
    Millimetre,
    Inch,
    /// CSS pixel (1/96 inch)
    Pixel,
}

impl Unit {
    /// Number of PDF points in one unit
    pub fn points_per_unit(self) -> f64 {
        match self {
            Unit::Point => 1.0,
            Unit::Millimetre => 72.0 / 25.4,
            Unit::Inch => 72.0,
            Unit::Pixel => 0.75,
        }
    }
}

impl FromStr for Unit {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" | "point" => Ok(Unit::Point),
            "mm" | "millimetre" | "millimeter" => Ok(Unit::Millimetre),
            "in" | "inch" => Ok(Unit::Inch),
            "px" | "pixel" => Ok(Unit::Pixel),
            other => Err(AnnotatorError::CompositionFailure(format!(
                "Unknown unit: {}",
                other
            ))),
        }
    }
}

/// What to do with canvas objects whose `type` is not path, text or rect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownObjectPolicy {
    #[default]
    Skip,
    Warn,
    Reject,
}

impl FromStr for UnknownObjectPolicy {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(UnknownObjectPolicy::Skip),
            "warn" => Ok(UnknownObjectPolicy::Warn),
            "reject" => Ok(UnknownObjectPolicy::Reject),
            other => Err(AnnotatorError::CompositionFailure(format!(
                "Unknown object policy: {}",
                other
            ))),
        }
    }
}

/// A `major.minor` PDF version as declared in the file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    pub const V1_4: PdfVersion = PdfVersion { major: 1, minor: 4 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PdfVersion {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AnnotatorError::CompositionFailure(format!("Invalid PDF version: {}", s));
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(PdfVersion {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Font family used for text annotations. Mapped to the standard 14 fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    Times,
    Helvetica,
    Courier,
}

impl FontFamily {
    pub fn base_font(self) -> &'static str {
        match self {
            FontFamily::Times => "Times-Roman",
            FontFamily::Helvetica => "Helvetica",
            FontFamily::Courier => "Courier",
        }
    }
}

/// Options controlling how annotations are composed onto the source pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub unit: Unit,
    /// Line width for freehand paths, in document units
    pub brush_size: f64,
    pub font_family: FontFamily,
    /// Canvas font size is divided by this to get the PDF font size
    pub font_ratio: f64,
    /// Fill opacity for highlight rectangles
    pub highlight_opacity: f64,
    /// Template stamp offset from the top-left corner, in document units
    pub template_offset: (f64, f64),
    /// Highest source PDF version accepted without prior normalization
    pub max_pdf_version: PdfVersion,
    pub unknown_objects: UnknownObjectPolicy,
    pub colors: ColorPolicy,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            unit: Unit::Millimetre,
            brush_size: 0.50,
            font_family: FontFamily::Times,
            font_ratio: 1.6,
            highlight_opacity: 0.30,
            template_offset: (1.0, 1.0),
            max_pdf_version: PdfVersion::V1_4,
            unknown_objects: UnknownObjectPolicy::Skip,
            colors: ColorPolicy::Strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_editor_calibration() {
        let opts = RenderOptions::default();
        assert_eq!(opts.brush_size, 0.50);
        assert_eq!(opts.font_ratio, 1.6);
        assert_eq!(opts.highlight_opacity, 0.30);
        assert_eq!(opts.template_offset, (1.0, 1.0));
        assert_eq!(opts.max_pdf_version, PdfVersion::new(1, 4));
        assert_eq!(opts.font_family.base_font(), "Times-Roman");
    }

    #[test]
    fn test_unit_conversion() {
        assert!((Unit::Millimetre.points_per_unit() - 2.834_645_669).abs() < 1e-6);
        assert_eq!(Unit::Inch.points_per_unit(), 72.0);
    }

    #[test]
    fn test_parse_unit_aliases() {
        assert_eq!("mm".parse::<Unit>().unwrap(), Unit::Millimetre);
        assert_eq!("PT".parse::<Unit>().unwrap(), Unit::Point);
        assert!("furlong".parse::<Unit>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        let v17: PdfVersion = "1.7".parse().unwrap();
        assert!(v17 > PdfVersion::V1_4);
        assert!(PdfVersion::new(1, 3) < PdfVersion::V1_4);
        assert_eq!(v17.to_string(), "1.7");
        assert!("x.y".parse::<PdfVersion>().is_err());
    }

    #[test]
    fn test_options_deserialize_partial() {
        let opts: RenderOptions =
            serde_json::from_str(r#"{"unit":"point","unknown_objects":"reject"}"#).unwrap();
        assert_eq!(opts.unit, Unit::Point);
        assert_eq!(opts.unknown_objects, UnknownObjectPolicy::Reject);
        assert_eq!(opts.brush_size, 0.50);
    }
}
