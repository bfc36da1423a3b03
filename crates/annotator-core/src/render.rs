//! Draw decoded canvas objects onto a page

use crate::draw::PageDrawContext;
use crate::error::{AnnotatorError, Result};
use crate::model::CanvasObject;
use crate::options::{RenderOptions, UnknownObjectPolicy};
use crate::parse::{parse_path, parse_rectangle, parse_text, PathShape, RectShape, TextShape};

/// What happened to one canvas object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn,
    Skipped,
}

pub struct AnnotationRenderer<'a> {
    options: &'a RenderOptions,
}

impl<'a> AnnotationRenderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    /// Parse and draw one object, dispatching on its type
    pub fn render(&self, object: &CanvasObject, ctx: &mut PageDrawContext) -> Result<RenderOutcome> {
        match object {
            CanvasObject::Path(path) => {
                let shape = parse_path(path, self.options.colors)?;
                self.render_path(&shape, ctx)?;
            }
            CanvasObject::Text(text) => {
                let shape = parse_text(text, self.options.colors)?;
                self.render_text(&shape, ctx)?;
            }
            CanvasObject::Rect(rect) => {
                let shape = parse_rectangle(rect, self.options.colors)?;
                self.render_rect(&shape, ctx)?;
            }
            CanvasObject::Unsupported { kind } => {
                return match self.options.unknown_objects {
                    UnknownObjectPolicy::Skip => {
                        tracing::debug!(kind = kind.as_str(), "skipping unsupported object");
                        Ok(RenderOutcome::Skipped)
                    }
                    UnknownObjectPolicy::Warn => {
                        tracing::warn!(kind = kind.as_str(), "skipping unsupported object");
                        Ok(RenderOutcome::Skipped)
                    }
                    UnknownObjectPolicy::Reject => Err(AnnotatorError::MalformedAnnotationObject(
                        format!("unsupported object type {:?}", kind),
                    )),
                };
            }
        }
        Ok(RenderOutcome::Drawn)
    }

    /// Draw a freehand path as connected line segments
    pub fn render_path(&self, shape: &PathShape, ctx: &mut PageDrawContext) -> Result<()> {
        ctx.set_draw_color(shape.stroke_color);
        ctx.set_line_width(self.options.brush_size);
        for pair in shape.points.windows(2) {
            ctx.line(pair[0].x, pair[0].y, pair[1].x, pair[1].y)?;
        }
        Ok(())
    }

    pub fn render_text(&self, shape: &TextShape, ctx: &mut PageDrawContext) -> Result<()> {
        ctx.set_text_color(shape.color);
        // canvas font sizes are larger than PDF points for the same visual size
        ctx.set_font(
            self.options.font_family,
            shape.font_size / self.options.font_ratio,
        );
        ctx.text(shape.x, shape.y + shape.height, &shape.text)
    }

    /// Draw a translucent filled rectangle. Opacity is back to full on return.
    pub fn render_rect(&self, shape: &RectShape, ctx: &mut PageDrawContext) -> Result<()> {
        ctx.set_fill_color(shape.fill_color);
        ctx.with_opacity(self.options.highlight_opacity, |ctx| {
            ctx.fill_rect(shape.x, shape.y, shape.width, shape.height)
        })
    }
}
