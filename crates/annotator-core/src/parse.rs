//! Canvas object parsers
//!
//! Each parser turns one decoded canvas object into a normalized shape in
//! document units, top-left anchored, ready for the renderers. Fabric
//! positions an object by the top-left corner of its bounding box, which
//! includes half the stroke width on every side; the parsers undo that.

use crate::color::{ColorPolicy, Rgb};
use crate::error::Result;
use crate::model::{finite, PathData, PathObject, RectObject, TextObject};
use kurbo::PathEl;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A freehand path flattened to absolute points
#[derive(Debug, Clone, PartialEq)]
pub struct PathShape {
    pub points: Vec<Point>,
    pub stroke_color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    /// Bounding box height; the baseline sits at `y + height`
    pub height: f64,
    pub text: String,
    pub color: Rgb,
    /// Font size in canvas units
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectShape {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill_color: Rgb,
}

/// Flatten a path object into absolute points and resolve its stroke color.
/// The path's bounding box is placed at the object's position, inside half
/// the stroke width, and scaled like the object.
pub fn parse_path(obj: &PathObject, colors: ColorPolicy) -> Result<PathShape> {
    let left = finite(obj.left, "left", "path")?;
    let top = finite(obj.top, "top", "path")?;
    let scale_x = finite(obj.scale_x.unwrap_or(1.0), "scaleX", "path")?;
    let scale_y = finite(obj.scale_y.unwrap_or(1.0), "scaleY", "path")?;
    let half_stroke = finite(obj.stroke_width.unwrap_or(0.0), "strokeWidth", "path")? / 2.0;

    let raw = path_points(&obj.path);
    let (min_x, min_y) = raw.iter().fold((f64::INFINITY, f64::INFINITY), |(mx, my), p| {
        (mx.min(p.x), my.min(p.y))
    });

    let points = raw
        .iter()
        .map(|p| {
            Point::new(
                left + (half_stroke + p.x - min_x) * scale_x,
                top + (half_stroke + p.y - min_y) * scale_y,
            )
        })
        .collect();

    Ok(PathShape {
        points,
        stroke_color: colors.resolve(obj.stroke.as_deref())?,
    })
}

pub fn parse_text(obj: &TextObject, colors: ColorPolicy) -> Result<TextShape> {
    let scale_x = finite(obj.scale_x.unwrap_or(1.0), "scaleX", "text")?;
    let scale_y = finite(obj.scale_y.unwrap_or(1.0), "scaleY", "text")?;

    Ok(TextShape {
        x: finite(obj.left, "left", "text")?,
        y: finite(obj.top, "top", "text")?,
        width: finite(obj.width.unwrap_or(0.0), "width", "text")? * scale_x,
        height: finite(obj.height, "height", "text")? * scale_y,
        text: obj.text.clone(),
        color: colors.resolve(obj.fill.as_deref())?,
        font_size: finite(obj.font_size, "fontSize", "text")? * scale_y,
    })
}

pub fn parse_rectangle(obj: &RectObject, colors: ColorPolicy) -> Result<RectShape> {
    let scale_x = finite(obj.scale_x.unwrap_or(1.0), "scaleX", "rect")?;
    let scale_y = finite(obj.scale_y.unwrap_or(1.0), "scaleY", "rect")?;
    let stroke = finite(obj.stroke_width.unwrap_or(0.0), "strokeWidth", "rect")?;

    Ok(RectShape {
        x: finite(obj.left, "left", "rect")? + stroke * scale_x / 2.0,
        y: finite(obj.top, "top", "rect")? + stroke * scale_y / 2.0,
        width: finite(obj.width, "width", "rect")? * scale_x,
        height: finite(obj.height, "height", "rect")? * scale_y,
        fill_color: colors.resolve(obj.fill.as_deref())?,
    })
}

/// Points visited by the path, in path space. Curve control points are
/// kept, so curves become polylines through them.
fn path_points(path: &PathData) -> Vec<Point> {
    let mut points = Vec::new();
    let mut subpath_start = Point::ORIGIN;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                subpath_start = Point::new(p.x, p.y);
                points.push(subpath_start);
            }
            PathEl::LineTo(p) => points.push(Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => {
                points.extend([p1, p2].iter().map(|p| Point::new(p.x, p.y)));
            }
            PathEl::CurveTo(p1, p2, p3) => {
                points.extend([p1, p2, p3].iter().map(|p| Point::new(p.x, p.y)));
            }
            PathEl::ClosePath => points.push(subpath_start),
        }
    }
    points
}
