use image::RgbaImage;
use rayon::prelude::*;

use super::blend_buffer;

/// Per-corner radii for a rounded rectangle, clockwise from the top-left.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct CornerRadii {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_right: f32,
    pub bottom_left: f32,
}

impl CornerRadii {
    /// Square top edge, rounded bottom edge.
    pub fn bottom(r: f32) -> Self {
        Self { top_left: 0.0, top_right: 0.0, bottom_right: r, bottom_left: r }
    }
}

/// Shape primitives used by the compositors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeKind {
    Ellipse,
    Rectangle,
    RoundedRect(CornerRadii),
}

/// How a shape is painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeFillMode {
    Filled,
    /// Stroke centred on the shape edge, `width` pixels wide.
    Outline { width: f32 },
}

/// An axis-aligned shape in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedShape {
    /// Center x in canvas coords
    pub cx: f32,
    /// Center y in canvas coords
    pub cy: f32,
    /// Half-width
    pub hw: f32,
    /// Half-height
    pub hh: f32,
    pub kind: ShapeKind,
    pub fill_mode: ShapeFillMode,
    pub color: [u8; 4],
}

impl PlacedShape {
    /// Filled, anti-aliased shape covering the rectangle `(x, y, w, h)`.
    pub fn filled_rect(kind: ShapeKind, x: f32, y: f32, w: f32, h: f32, color: [u8; 4]) -> Self {
        Self {
            cx: x + w * 0.5,
            cy: y + h * 0.5,
            hw: w * 0.5,
            hh: h * 0.5,
            kind,
            fill_mode: ShapeFillMode::Filled,
            color,
        }
    }

    /// Stroke of `line_width` centred on the edges of `(x, y, w, h)`, with
    /// square (mitered) corners.
    pub fn stroked_rect(x: f32, y: f32, w: f32, h: f32, line_width: f32, color: [u8; 4]) -> Self {
        Self {
            fill_mode: ShapeFillMode::Outline { width: line_width },
            ..Self::filled_rect(ShapeKind::Rectangle, x, y, w, h, color)
        }
    }

    fn outline_width(&self) -> f32 {
        match self.fill_mode {
            ShapeFillMode::Filled => 0.0,
            ShapeFillMode::Outline { width } => width,
        }
    }
}

// ============================================================================
// SDF functions - return signed distance (negative = inside)
// ============================================================================

/// Mitered distance to a box centred at origin with half-extents (hx, hy).
/// Offsets of this field keep square corners, which is what a canvas
/// `strokeRect` produces.
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    (px.abs() - hx).max(py.abs() - hy)
}

/// Euclidean distance to a box; used as the core of the rounded box.
#[inline]
fn sdf_box_euclid(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for a box whose corners each carry their own radius.
/// Screen coordinates: +y points down, so `py >= 0` is the bottom half.
#[inline]
fn sdf_rounded_box(px: f32, py: f32, hx: f32, hy: f32, radii: &CornerRadii) -> f32 {
    let r = match (px >= 0.0, py >= 0.0) {
        (false, false) => radii.top_left,
        (true, false) => radii.top_right,
        (true, true) => radii.bottom_right,
        (false, true) => radii.bottom_left,
    };
    let r = r.min(hx).min(hy).max(0.0);
    sdf_box_euclid(px, py, hx - r, hy - r) - r
}

/// SDF for an ellipse (approximation, exact for circles).
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    if rx <= 0.0 || ry <= 0.0 {
        return f32::MAX;
    }
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// Compute the SDF value for a shape kind at local coordinates (centered at origin).
pub fn shape_sdf(kind: &ShapeKind, px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    match kind {
        ShapeKind::Rectangle => sdf_box(px, py, hx, hy),
        ShapeKind::Ellipse => sdf_ellipse(px, py, hx, hy),
        ShapeKind::RoundedRect(radii) => sdf_rounded_box(px, py, hx, hy, radii),
    }
}

/// Rasterize a shape into an RGBA buffer clipped to the canvas.
///
/// Returns `(buf, buf_w, buf_h, offset_x, offset_y)` where offset is the
/// top-left corner of the buffer in canvas coordinates.
pub fn rasterize_shape(
    placed: &PlacedShape,
    canvas_w: u32,
    canvas_h: u32,
) -> (Vec<u8>, u32, u32, i32, i32) {
    if placed.hw <= 0.0 || placed.hh <= 0.0 {
        return (Vec::new(), 0, 0, 0, 0);
    }

    // Bounding box, padded for the stroke and the AA ramp
    let pad = placed.outline_width() * 0.5 + 2.0;
    let x0 = ((placed.cx - placed.hw - pad).floor() as i32).max(0);
    let y0 = ((placed.cy - placed.hh - pad).floor() as i32).max(0);
    let x1 = ((placed.cx + placed.hw + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((placed.cy + placed.hh + pad).ceil() as i32).min(canvas_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;

    if buf_w == 0 || buf_h == 0 {
        return (Vec::new(), 0, 0, 0, 0);
    }

    let row_bytes = buf_w as usize * 4;
    let mut buf = vec![0u8; row_bytes * buf_h as usize];

    let color = placed.color;
    let fill_mode = placed.fill_mode;
    let kind = placed.kind;
    let (cx, cy, hx, hy) = (placed.cx, placed.cy, placed.hw, placed.hh);

    // Anti-aliased coverage over a one-pixel ramp centred on the edge
    let coverage_of = |d: f32| -> f32 { smoothstep(0.5, -0.5, d) };

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row as i32) as f32 + 0.5 - cy;
            for col in 0..buf_w as usize {
                let px = (x0 + col as i32) as f32 + 0.5 - cx;

                let coverage = match fill_mode {
                    ShapeFillMode::Filled => coverage_of(shape_sdf(&kind, px, py, hx, hy)),
                    ShapeFillMode::Outline { width } => {
                        // Band between the outward and inward offsets of the edge
                        let half = width * 0.5;
                        let outer = coverage_of(shape_sdf(&kind, px, py, hx + half, hy + half));
                        let inner = if hx > half && hy > half {
                            coverage_of(shape_sdf(&kind, px, py, hx - half, hy - half))
                        } else {
                            0.0
                        };
                        (outer - inner).max(0.0)
                    }
                };

                if coverage > 0.001 {
                    let idx = col * 4;
                    let a = (color[3] as f32 * coverage).round().min(255.0) as u8;
                    row_buf[idx] = color[0];
                    row_buf[idx + 1] = color[1];
                    row_buf[idx + 2] = color[2];
                    row_buf[idx + 3] = a;
                }
            }
        });

    (buf, buf_w, buf_h, x0, y0)
}

/// Rasterize `placed` and blend it source-over onto `canvas`.
pub fn draw_shape(canvas: &mut RgbaImage, placed: &PlacedShape) {
    let (buf, w, h, x, y) = rasterize_shape(placed, canvas.width(), canvas.height());
    blend_buffer(canvas, buf, w, h, x, y);
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
