//! Logo badge compositor: border ring, background shape, and the uploaded logo
//! scaled to fit inside the padding, flattened onto a fixed 2048px canvas.

use image::imageops::FilterType;
use image::RgbaImage;

use super::overlay;
use super::shapes::{draw_shape, PlacedShape, ShapeKind};
use crate::style::{LogoShape, LogoStyle, CANVAS_SIZE};

/// Geometry of one composite, in canvas pixels (float, before rounding).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogoLayout {
    pub canvas_size: f32,
    pub border_thickness: f32,
    /// Side (or diameter) of the background shape; never negative.
    pub inner_size: f32,
    /// Distance from the canvas edge to the logo draw area.
    pub padding: f32,
    /// Side of the square the logo is fitted into; never negative.
    pub draw_area: f32,
    pub scale: f32,
    pub draw_x: f32,
    pub draw_y: f32,
    pub draw_width: f32,
    pub draw_height: f32,
}

impl LogoLayout {
    pub fn compute(style: &LogoStyle, image_w: u32, image_h: u32) -> Self {
        let s = CANVAS_SIZE as f32;
        let border_thickness = style.border_width_percent as f32 / 100.0 * s;
        let inner_size = (s - border_thickness * 2.0).max(0.0);
        let padding = style.padding_percent as f32 / 100.0 * inner_size + border_thickness;
        let draw_area = (s - padding * 2.0).max(0.0);

        let scale = if image_w == 0 || image_h == 0 {
            0.0
        } else {
            (draw_area / image_w as f32).min(draw_area / image_h as f32)
        };
        let draw_width = image_w as f32 * scale;
        let draw_height = image_h as f32 * scale;

        Self {
            canvas_size: s,
            border_thickness,
            inner_size,
            padding,
            draw_area,
            scale,
            draw_x: (s - draw_width) * 0.5,
            draw_y: (s - draw_height) * 0.5,
            draw_width,
            draw_height,
        }
    }
}

fn shape_kind(shape: LogoShape) -> ShapeKind {
    match shape {
        LogoShape::Circle => ShapeKind::Ellipse,
        LogoShape::Square => ShapeKind::Rectangle,
    }
}

/// Flatten `image` onto a `CANVAS_SIZE`² badge described by `style`.
///
/// The result is transparent outside the badge shape (the corners of a circle
/// badge) and the same size whatever the source dimensions.
pub fn compose_logo(image: &RgbaImage, style: &LogoStyle) -> RgbaImage {
    let style = style.clamped();
    let layout = LogoLayout::compute(&style, image.width(), image.height());
    let s = layout.canvas_size;
    let kind = shape_kind(style.shape);

    let mut canvas = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);

    // 1. Border: the full shape in the border color, later covered by the inner shape
    if style.border_width_percent > 0 {
        draw_shape(
            &mut canvas,
            &PlacedShape::filled_rect(kind, 0.0, 0.0, s, s, style.border_color.0),
        );
    }

    // 2. Background shape inset by the border thickness
    if layout.inner_size > 0.0 {
        draw_shape(
            &mut canvas,
            &PlacedShape::filled_rect(
                kind,
                layout.border_thickness,
                layout.border_thickness,
                layout.inner_size,
                layout.inner_size,
                style.background_color.0,
            ),
        );
    }

    // 3. Logo, uniformly scaled into the draw area and centred
    let w = layout.draw_width.round() as u32;
    let h = layout.draw_height.round() as u32;
    if w == 0 || h == 0 {
        log_warn!(
            "logo draw area collapsed ({}% border, {}% padding); badge drawn without logo",
            style.border_width_percent,
            style.padding_percent
        );
        return canvas;
    }
    let scaled = image::imageops::resize(image, w, h, FilterType::Lanczos3);
    overlay(
        &mut canvas,
        &scaled,
        layout.draw_x.round() as i64,
        layout.draw_y.round() as i64,
    );

    canvas
}
