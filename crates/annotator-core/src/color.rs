//! Canvas color decoding
//!
//! Fabric.js serializes colors as CSS strings: named colors (`"black"`),
//! functional notation (`"rgb(255,0,0)"`, `"rgba(0,0,0,0.5)"`) or hex
//! (`"#ff0000"`, `"#f00"`). Everything is decoded to three 0-255 channels.

use crate::error::{AnnotatorError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// `rgb(r, g, b)` or `rgba(r, g, b, a)` with integer or decimal channels
    static ref RGB_FUNCTION_PATTERN: Regex = Regex::new(
        r"(?i)^rgba?\(\s*([0-9]*\.?[0-9]+)\s*,\s*([0-9]*\.?[0-9]+)\s*,\s*([0-9]*\.?[0-9]+)\s*(?:,\s*[0-9]*\.?[0-9]+\s*)?\)$"
    )
    .unwrap();
}

/// An RGB color with 0-255 channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as PDF color operands (0.0-1.0)
    pub fn to_pdf_components(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl From<Rgb> for (u8, u8, u8) {
    fn from(c: Rgb) -> Self {
        (c.r, c.g, c.b)
    }
}

/// What to do with a color string that cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPolicy {
    /// Fail the document with `UnsupportedColorFormat`
    #[default]
    Strict,
    /// Draw with black and log a warning
    FallbackToBlack,
}

impl ColorPolicy {
    /// Resolve an optional color field. Absent colors are black under every policy.
    pub fn resolve(self, value: Option<&str>) -> Result<Rgb> {
        let Some(value) = value else {
            return Ok(Rgb::BLACK);
        };
        match (decode_color(value), self) {
            (Ok(rgb), _) => Ok(rgb),
            (Err(e), ColorPolicy::Strict) => Err(e),
            (Err(_), ColorPolicy::FallbackToBlack) => {
                tracing::warn!(color = value, "unrecognized color, falling back to black");
                Ok(Rgb::BLACK)
            }
        }
    }
}

/// Named colors understood by the editor palette (CSS basic colors plus a few extended names)
const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", Rgb::new(0, 0, 0)),
    ("white", Rgb::new(255, 255, 255)),
    ("red", Rgb::new(255, 0, 0)),
    ("lime", Rgb::new(0, 255, 0)),
    ("green", Rgb::new(0, 128, 0)),
    ("blue", Rgb::new(0, 0, 255)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("cyan", Rgb::new(0, 255, 255)),
    ("aqua", Rgb::new(0, 255, 255)),
    ("magenta", Rgb::new(255, 0, 255)),
    ("fuchsia", Rgb::new(255, 0, 255)),
    ("silver", Rgb::new(192, 192, 192)),
    ("gray", Rgb::new(128, 128, 128)),
    ("grey", Rgb::new(128, 128, 128)),
    ("maroon", Rgb::new(128, 0, 0)),
    ("olive", Rgb::new(128, 128, 0)),
    ("purple", Rgb::new(128, 0, 128)),
    ("teal", Rgb::new(0, 128, 128)),
    ("navy", Rgb::new(0, 0, 128)),
    ("orange", Rgb::new(255, 165, 0)),
    ("pink", Rgb::new(255, 192, 203)),
    ("brown", Rgb::new(165, 42, 42)),
];

/// Decode a canvas color string into RGB channels
pub fn decode_color(value: &str) -> Result<Rgb> {
    let trimmed = value.trim();
    let unsupported = || AnnotatorError::UnsupportedColorFormat(value.to_string());

    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(unsupported);
    }

    if let Some(caps) = RGB_FUNCTION_PATTERN.captures(trimmed) {
        let mut channels = [0u8; 3];
        for (slot, idx) in channels.iter_mut().zip(1..=3) {
            *slot = parse_channel(&caps[idx]).ok_or_else(unsupported)?;
        }
        return Ok(Rgb::new(channels[0], channels[1], channels[2]));
    }

    let lower = trimmed.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgb)| *rgb)
        .ok_or_else(unsupported)
}

fn parse_channel(raw: &str) -> Option<u8> {
    let value: f64 = raw.parse().ok()?;
    if !(0.0..=255.0).contains(&value) {
        return None;
    }
    Some(value.round() as u8)
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(Rgb::new(
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        // #rgb shorthand: each digit is doubled
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
            Some(Rgb::new(digit(0)?, digit(1)?, digit(2)?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_is_zero() {
        assert_eq!(decode_color("black").unwrap(), Rgb::new(0, 0, 0));
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!(decode_color("Red").unwrap(), Rgb::new(255, 0, 0));
        assert_eq!(decode_color("  YELLOW ").unwrap(), Rgb::new(255, 255, 0));
    }

    #[test]
    fn test_rgb_function() {
        assert_eq!(decode_color("rgb(12, 34, 56)").unwrap(), Rgb::new(12, 34, 56));
        assert_eq!(decode_color("rgb(0,0,0)").unwrap(), Rgb::BLACK);
    }

    #[test]
    fn test_rgba_ignores_alpha() {
        assert_eq!(
            decode_color("rgba(255, 255, 0, 0.3)").unwrap(),
            Rgb::new(255, 255, 0)
        );
    }

    #[test]
    fn test_decimal_channels_round() {
        assert_eq!(decode_color("rgb(10.4, 10.6, 0)").unwrap(), Rgb::new(10, 11, 0));
    }

    #[test]
    fn test_hex_forms() {
        assert_eq!(decode_color("#FF8000").unwrap(), Rgb::new(255, 128, 0));
        assert_eq!(decode_color("#f00").unwrap(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_unknown_name_fails() {
        let err = decode_color("octarine").unwrap_err();
        assert!(matches!(err, AnnotatorError::UnsupportedColorFormat(ref s) if s == "octarine"));
    }

    #[test]
    fn test_out_of_range_channel_fails() {
        assert!(matches!(
            decode_color("rgb(256, 0, 0)"),
            Err(AnnotatorError::UnsupportedColorFormat(_))
        ));
    }

    #[test]
    fn test_malformed_strings_fail() {
        for bad in ["", "rgb(1,2)", "#12345", "#ggg", "rgb(a,b,c)", "1 2 3"] {
            assert!(
                matches!(decode_color(bad), Err(AnnotatorError::UnsupportedColorFormat(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_policy_fallback() {
        assert_eq!(
            ColorPolicy::FallbackToBlack.resolve(Some("octarine")).unwrap(),
            Rgb::BLACK
        );
        assert!(ColorPolicy::Strict.resolve(Some("octarine")).is_err());
        assert_eq!(ColorPolicy::Strict.resolve(None).unwrap(), Rgb::BLACK);
    }

    #[test]
    fn test_pdf_components() {
        assert_eq!(Rgb::new(255, 0, 0).to_pdf_components(), [1.0, 0.0, 0.0]);
    }
}
