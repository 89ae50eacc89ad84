//! Rectangle math over PDF coordinate spaces.
//!
//! All coordinates are PDF points (1/72 inch) with the origin at the page's
//! top-left corner, matching what the rasterizer reports. Pixel mapping
//! assumes the page was rendered at a uniform `dpi / 72` scale.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Intersection with `other`. May be empty; check [`Rect::is_empty`].
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Expand left, right, and bottom by the given margins. The top edge is
    /// left alone: captions and axis labels sit beside or below a figure,
    /// not above it.
    pub fn expand(&self, margins: &Margins) -> Rect {
        Rect {
            x0: self.x0 - margins.left,
            y0: self.y0,
            x1: self.x1 + margins.right,
            y1: self.y1 + margins.bottom,
        }
    }
}

/// Crop expansion margins in PDF points.
#[derive(Debug, Clone, Copy)]
pub struct Margins {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 20.0,
            right: 20.0,
            bottom: 50.0,
        }
    }
}

/// Map a clip rectangle into the pixel space of a page rendered at `dpi`.
///
/// Returns `(x, y, width, height)` in pixels, clamped so the window never
/// exceeds the rendered page. The clip is assumed to already be clipped to
/// the page bounds; clamping here only absorbs rounding at the edges.
pub fn pixel_window(
    page: &Rect,
    clip: &Rect,
    dpi: f32,
    raster_width: u32,
    raster_height: u32,
) -> (u32, u32, u32, u32) {
    let scale = dpi / 72.0;

    let x = (((clip.x0 - page.x0) * scale).floor().max(0.0)) as u32;
    let y = (((clip.y0 - page.y0) * scale).floor().max(0.0)) as u32;
    let x = x.min(raster_width.saturating_sub(1));
    let y = y.min(raster_height.saturating_sub(1));

    let w = ((clip.width() * scale).round() as u32).max(1).min(raster_width - x);
    let h = ((clip.height() * scale).round() as u32).max(1).min(raster_height - y);

    (x, y, w, h)
}
