//! Per-page drawing context
//!
//! Annotation coordinates are top-left anchored in document units. PDF user
//! space is bottom-left anchored in points. `PageDrawContext` converts
//! between the two, tracks the drawing state (colors, line width, font,
//! opacity) for one destination page and collects the content stream
//! operations and resources that page needs.
//!
//! Fill and text colors share the PDF non-stroking color, so both are kept
//! as logical state and synced to the stream only when something is drawn.

use crate::color::Rgb;
use crate::error::{AnnotatorError, Result};
use crate::options::{FontFamily, Unit};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use std::collections::BTreeMap;

pub const FULL_OPACITY: f64 = 1.0;

/// Drawing state as set by the renderers
#[derive(Debug, Clone, PartialEq)]
struct DrawState {
    draw_color: Rgb,
    fill_color: Rgb,
    text_color: Rgb,
    /// In document units
    line_width: f64,
    /// Family and size in points
    font: Option<(FontFamily, f64)>,
    opacity: f64,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            draw_color: Rgb::BLACK,
            fill_color: Rgb::BLACK,
            text_color: Rgb::BLACK,
            line_width: 0.2,
            font: None,
            opacity: FULL_OPACITY,
        }
    }
}

/// What has actually been written to the content stream
#[derive(Debug, Clone, Default)]
struct StreamState {
    stroke_rgb: Option<Rgb>,
    nonstroke_rgb: Option<Rgb>,
    line_width_pt: Option<f64>,
}

pub struct PageDrawContext {
    width_pt: f64,
    height_pt: f64,
    scale: f64,
    state: DrawState,
    stream: StreamState,
    operations: Vec<Operation>,
    fonts: BTreeMap<&'static str, String>,
    ext_gstates: BTreeMap<String, f64>,
    xobjects: BTreeMap<String, ObjectId>,
}

impl PageDrawContext {
    /// Create a context for a page of the given size in points
    pub fn new(width_pt: f64, height_pt: f64, unit: Unit) -> Self {
        Self {
            width_pt,
            height_pt,
            scale: unit.points_per_unit(),
            state: DrawState::default(),
            stream: StreamState::default(),
            operations: Vec::new(),
            fonts: BTreeMap::new(),
            ext_gstates: BTreeMap::new(),
            xobjects: BTreeMap::new(),
        }
    }

    pub fn width_pt(&self) -> f64 {
        self.width_pt
    }

    pub fn height_pt(&self) -> f64 {
        self.height_pt
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn opacity(&self) -> f64 {
        self.state.opacity
    }

    pub fn line_width(&self) -> f64 {
        self.state.line_width
    }

    pub fn set_draw_color(&mut self, color: Rgb) {
        self.state.draw_color = color;
    }

    pub fn set_fill_color(&mut self, color: Rgb) {
        self.state.fill_color = color;
    }

    pub fn set_text_color(&mut self, color: Rgb) {
        self.state.text_color = color;
    }

    /// Line width in document units
    pub fn set_line_width(&mut self, width: f64) {
        self.state.line_width = width;
    }

    pub fn set_font(&mut self, family: FontFamily, size_pt: f64) {
        self.state.font = Some((family, size_pt));
    }

    /// Set the fill and stroke opacity for everything drawn afterwards
    pub fn set_opacity(&mut self, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha == self.state.opacity {
            return;
        }
        let name = self.ext_gstate_name(alpha);
        self.push("gs", vec![Object::Name(name.into_bytes())]);
        self.state.opacity = alpha;
    }

    /// Run `draw` with a temporary opacity, restoring full opacity on every exit path
    pub fn with_opacity<T>(
        &mut self,
        alpha: f64,
        draw: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.set_opacity(alpha);
        let result = draw(self);
        self.set_opacity(FULL_OPACITY);
        result
    }

    /// Stroke a straight line between two points in document units
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        ensure_finite(&[x1, y1, x2, y2], "line")?;
        self.sync_stroke();
        let (px1, py1) = self.to_pdf(x1, y1);
        let (px2, py2) = self.to_pdf(x2, y2);
        self.push("m", vec![real(px1), real(py1)]);
        self.push("l", vec![real(px2), real(py2)]);
        self.push("S", vec![]);
        Ok(())
    }

    /// Fill a rectangle whose top-left corner is at (x, y), in document units
    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        ensure_finite(&[x, y, width, height], "rectangle")?;
        self.sync_nonstroke(self.state.fill_color);
        let (px, py) = self.to_pdf(x, y + height);
        self.push(
            "re",
            vec![
                real(px),
                real(py),
                real(width * self.scale),
                real(height * self.scale),
            ],
        );
        self.push("f", vec![]);
        Ok(())
    }

    /// Draw a single line of text with its baseline starting at (x, y)
    pub fn text(&mut self, x: f64, y: f64, text: &str) -> Result<()> {
        ensure_finite(&[x, y], "text")?;
        let (family, size) = self.state.font.ok_or_else(|| {
            AnnotatorError::CompositionFailure("No font selected before drawing text".into())
        })?;
        let font_name = self.font_name(family);
        let (px, py) = self.to_pdf(x, y);

        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font_name.into_bytes()), real(size)]);
        self.sync_nonstroke(self.state.text_color);
        self.push("Td", vec![real(px), real(py)]);
        self.push(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        );
        self.push("ET", vec![]);
        Ok(())
    }

    /// Paint a Form XObject whose displayed top-left corner lands at (x, y) in document units
    pub fn stamp_xobject(&mut self, name: &str, id: ObjectId, x: f64, y: f64) {
        self.xobjects.insert(name.to_string(), id);
        let tx = x * self.scale;
        let ty = -y * self.scale;
        self.push("q", vec![]);
        self.push(
            "cm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                real(tx),
                real(ty),
            ],
        );
        self.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.push("Q", vec![]);
    }

    /// Encode the content stream and build the page's resource dictionary
    pub fn finish(self) -> Result<(Vec<u8>, Dictionary)> {
        let content = Content {
            operations: self.operations,
        }
        .encode()?;

        let mut resources = Dictionary::new();
        if !self.fonts.is_empty() {
            let mut fonts = Dictionary::new();
            for (base_font, name) in &self.fonts {
                let mut font = Dictionary::new();
                font.set("Type", Object::Name(b"Font".to_vec()));
                font.set("Subtype", Object::Name(b"Type1".to_vec()));
                font.set("BaseFont", Object::Name(base_font.as_bytes().to_vec()));
                font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
                fonts.set(name.as_bytes(), Object::Dictionary(font));
            }
            resources.set("Font", Object::Dictionary(fonts));
        }
        if !self.ext_gstates.is_empty() {
            let mut states = Dictionary::new();
            for (name, alpha) in &self.ext_gstates {
                let mut gs = Dictionary::new();
                gs.set("Type", Object::Name(b"ExtGState".to_vec()));
                gs.set("ca", real(*alpha));
                gs.set("CA", real(*alpha));
                gs.set("BM", Object::Name(b"Normal".to_vec()));
                states.set(name.as_bytes(), Object::Dictionary(gs));
            }
            resources.set("ExtGState", Object::Dictionary(states));
        }
        if !self.xobjects.is_empty() {
            let mut xobjects = Dictionary::new();
            for (name, id) in &self.xobjects {
                xobjects.set(name.as_bytes(), Object::Reference(*id));
            }
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        Ok((content, resources))
    }

    fn to_pdf(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale, self.height_pt - y * self.scale)
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn sync_stroke(&mut self) {
        let color = self.state.draw_color;
        if self.stream.stroke_rgb != Some(color) {
            let [r, g, b] = color.to_pdf_components();
            self.push("RG", vec![Object::Real(r), Object::Real(g), Object::Real(b)]);
            self.stream.stroke_rgb = Some(color);
        }
        let width_pt = self.state.line_width * self.scale;
        if self.stream.line_width_pt != Some(width_pt) {
            self.push("w", vec![real(width_pt)]);
            self.stream.line_width_pt = Some(width_pt);
        }
    }

    fn sync_nonstroke(&mut self, color: Rgb) {
        if self.stream.nonstroke_rgb != Some(color) {
            let [r, g, b] = color.to_pdf_components();
            self.push("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]);
            self.stream.nonstroke_rgb = Some(color);
        }
    }

    fn font_name(&mut self, family: FontFamily) -> String {
        let next = self.fonts.len() + 1;
        self.fonts
            .entry(family.base_font())
            .or_insert_with(|| format!("F{}", next))
            .clone()
    }

    fn ext_gstate_name(&mut self, alpha: f64) -> String {
        if let Some((name, _)) = self.ext_gstates.iter().find(|(_, a)| **a == alpha) {
            return name.clone();
        }
        let name = format!("GS{}", self.ext_gstates.len() + 1);
        self.ext_gstates.insert(name.clone(), alpha);
        name
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(AnnotatorError::CompositionFailure(format!(
            "Non-finite geometry for {}",
            what
        )))
    }
}

/// Encode text for a WinAnsi standard font. Characters outside Latin-1 become '?'.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            // single-line output: line breaks become spaces
            0x0a | 0x0d => b' ',
            0x20..=0x7e | 0xa0..=0xff => c as u8,
            0x2018 | 0x2019 => b'\'',
            0x201c | 0x201d => b'"',
            0x2013 | 0x2014 => b'-',
            _ => b'?',
        })
        .collect()
}
