//! Annotation document schema
//!
//! The canvas editor posts one JSON document per annotated file:
//!
//! ```json
//! {
//!   "page_setup": { "orientation": "portrait" },
//!   "pages": [
//!     [ { "objects": [ { "type": "rect", "left": 10, "top": 10, ... } ] } ],
//!     []
//!   ]
//! }
//! ```
//!
//! Everything is validated here, at decode time, so the renderers only ever
//! see well-typed objects.

use crate::error::{AnnotatorError, Result};
use kurbo::{BezPath, PathEl};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page orientation requested by the editor for the whole document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    #[serde(alias = "p")]
    Portrait,
    #[serde(alias = "l")]
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSetup {
    #[serde(default)]
    pub orientation: Orientation,
}

/// The decoded annotation payload for one source PDF
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnnotationDocument {
    #[serde(default)]
    pub page_setup: PageSetup,
    #[serde(default)]
    pub pages: Vec<PageAnnotations>,
}

impl AnnotationDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Objects for a 1-based page number; empty when the page has no entry
    pub fn objects_for_page(&self, page_number: u32) -> &[CanvasObject] {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .map(|page| page.objects.as_slice())
            .unwrap_or(&[])
    }
}

/// Annotations for a single page. An absent or empty entry means no annotations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAnnotations {
    pub objects: Vec<CanvasObject>,
}

impl PageAnnotations {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[derive(Deserialize)]
struct ObjectsWrapper {
    #[serde(default)]
    objects: Option<Vec<CanvasObject>>,
}

impl<'de> Deserialize<'de> for PageAnnotations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Accepted shapes: null, [], [{"objects": [...]}], {"objects": [...]}, {}
        let wrapper = match Value::deserialize(deserializer)? {
            Value::Null => return Ok(Self::default()),
            Value::Array(mut items) => match items.len() {
                0 => return Ok(Self::default()),
                1 => items.remove(0),
                n => {
                    return Err(de::Error::custom(format!(
                        "expected at most one object wrapper per page, found {}",
                        n
                    )))
                }
            },
            obj @ Value::Object(_) => obj,
            other => {
                return Err(de::Error::custom(format!(
                    "expected an object wrapper for page, found {}",
                    json_kind(&other)
                )))
            }
        };

        if wrapper.is_null() {
            return Ok(Self::default());
        }
        let raw: ObjectsWrapper = serde_json::from_value(wrapper).map_err(de::Error::custom)?;
        Ok(Self {
            objects: raw.objects.unwrap_or_default(),
        })
    }
}

/// One drawable object from the canvas, selected by its `type` tag
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasObject {
    Path(PathObject),
    Text(TextObject),
    Rect(RectObject),
    /// A `type` this renderer does not draw (e.g. circle, image)
    Unsupported { kind: String },
}

impl CanvasObject {
    pub fn kind(&self) -> &str {
        match self {
            CanvasObject::Path(_) => "path",
            CanvasObject::Text(_) => "i-text",
            CanvasObject::Rect(_) => "rect",
            CanvasObject::Unsupported { kind } => kind,
        }
    }
}

impl<'de> Deserialize<'de> for CanvasObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = match value.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "object type must be a string, found {}",
                    json_kind(other)
                )))
            }
            None => return Err(de::Error::custom("object is missing its type")),
        };

        let decoded = match kind.as_str() {
            "path" => serde_json::from_value(value).map(CanvasObject::Path),
            "i-text" | "text" | "textbox" => serde_json::from_value(value).map(CanvasObject::Text),
            "rect" => serde_json::from_value(value).map(CanvasObject::Rect),
            _ => return Ok(CanvasObject::Unsupported { kind }),
        };
        decoded.map_err(|e| de::Error::custom(format!("{} object: {}", kind, e)))
    }
}

/// Freehand drawing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathObject {
    #[serde(alias = "x")]
    pub left: f64,
    #[serde(alias = "y")]
    pub top: f64,
    pub path: PathData,
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f64>,
    #[serde(default)]
    pub scale_x: Option<f64>,
    #[serde(default)]
    pub scale_y: Option<f64>,
}

/// Inserted text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextObject {
    #[serde(alias = "x")]
    pub left: f64,
    #[serde(alias = "y")]
    pub top: f64,
    #[serde(default)]
    pub width: Option<f64>,
    pub height: f64,
    pub font_size: f64,
    pub text: String,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub scale_x: Option<f64>,
    #[serde(default)]
    pub scale_y: Option<f64>,
}

/// Highlight rectangle
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectObject {
    #[serde(alias = "x")]
    pub left: f64,
    #[serde(alias = "y")]
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f64>,
    #[serde(default)]
    pub scale_x: Option<f64>,
    #[serde(default)]
    pub scale_y: Option<f64>,
}

/// Path geometry. Fabric serializes it either as nested command arrays
/// (`[["M", 0, 0], ["Q", 1, 1, 2, 0]]`) or as an SVG path string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData(pub BezPath);

impl PathData {
    pub fn from_svg(data: &str) -> std::result::Result<Self, String> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        BezPath::from_svg(data)
            .map(PathData)
            .map_err(|e| format!("invalid path data {:?}: {}", data, e))
    }

    /// Build from the array form, one `[command, args...]` entry per command
    pub fn from_commands(commands: &[Value]) -> std::result::Result<Self, String> {
        let mut svg = String::new();
        for command in commands {
            write_command(&mut svg, command)?;
        }
        Self::from_svg(&svg)
    }

    pub fn elements(&self) -> &[PathEl] {
        self.0.elements()
    }
}

impl<'de> Deserialize<'de> for PathData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(svg) => PathData::from_svg(&svg).map_err(de::Error::custom),
            Value::Array(items) => PathData::from_commands(&items).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "path must be an array or string, found {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Arguments taken by one repetition of an SVG path command
fn arity(op: char) -> Option<usize> {
    match op.to_ascii_uppercase() {
        'M' | 'L' | 'T' => Some(2),
        'Q' | 'S' => Some(4),
        'C' => Some(6),
        'H' | 'V' => Some(1),
        'A' => Some(7),
        'Z' => Some(0),
        _ => None,
    }
}

/// Append one array-form command to `svg` as path data
fn write_command(svg: &mut String, command: &Value) -> std::result::Result<(), String> {
    let Value::Array(parts) = command else {
        return Err(format!("path command must be an array, found {}", json_kind(command)));
    };
    let (op, args) = match parts.split_first() {
        Some((Value::String(name), args)) => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(op), None) => (op, args),
                _ => return Err(format!("invalid path command name: {:?}", name)),
            }
        }
        Some((other, _)) => return Err(format!("invalid path command name: {}", other)),
        None => return Err("empty path command".to_string()),
    };

    let n = arity(op).ok_or_else(|| format!("unsupported path command {:?}", op))?;
    let valid_count = if n == 0 {
        args.is_empty()
    } else {
        !args.is_empty() && args.len() % n == 0
    };
    if !valid_count {
        return Err(format!("path command {:?} has {} arguments", op, args.len()));
    }

    svg.push(op);
    for arg in args {
        let value = arg
            .as_f64()
            .ok_or_else(|| format!("non-numeric argument {} in {} command", arg, op))?;
        svg.push_str(&format!(" {}", value));
    }
    svg.push(' ');
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Ensure a number read from the canvas is usable as a coordinate
pub(crate) fn finite(value: f64, field: &str, kind: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnnotatorError::MalformedAnnotationObject(format!(
            "{} object has non-finite {}",
            kind, field
        )))
    }
}
