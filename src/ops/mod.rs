//! Raster operations.  Everything here works on `image::RgbaImage` surfaces
//! with straight alpha and source-over blending.

pub mod export;
pub mod logo;
pub mod qr;
pub mod shapes;
pub mod text;

use image::{Rgba, RgbaImage};

/// Source-over blend of one straight-alpha pixel onto another.
#[inline]
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        *dst = src;
        return;
    }
    let da = dst[3] as u32;
    // out_a = sa + da * (1 - sa), everything in 0..=255 fixed point
    let da_scaled = da * (255 - sa);
    let out_a = sa * 255 + da_scaled;
    if out_a == 0 {
        return;
    }
    for c in 0..3 {
        let v = (src[c] as u32 * sa * 255 + dst[c] as u32 * da_scaled + out_a / 2) / out_a;
        dst[c] = v.min(255) as u8;
    }
    dst[3] = ((out_a + 127) / 255).min(255) as u8;
}

/// Blend `layer` onto `canvas` with its top-left corner at `(x, y)`.
/// Parts of the layer outside the canvas are dropped.
pub fn overlay(canvas: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + layer.width() as i64).min(cw);
    let y1 = (y + layer.height() as i64).min(ch);
    for cy in y0..y1 {
        for cx in x0..x1 {
            let src = *layer.get_pixel((cx - x) as u32, (cy - y) as u32);
            blend_pixel(canvas.get_pixel_mut(cx as u32, cy as u32), src);
        }
    }
}

/// Blend a straight-alpha RGBA buffer onto `canvas` with its top-left corner
/// at `(x, y)`.
pub fn blend_buffer(canvas: &mut RgbaImage, buf: Vec<u8>, buf_w: u32, buf_h: u32, x: i32, y: i32) {
    if buf_w == 0 || buf_h == 0 {
        return;
    }
    if let Some(layer) = RgbaImage::from_raw(buf_w, buf_h, buf) {
        overlay(canvas, &layer, x as i64, y as i64);
    }
}

/// Fill the whole surface with one color (no blending).
pub fn fill(canvas: &mut RgbaImage, color: Rgba<u8>) {
    for px in canvas.pixels_mut() {
        *px = color;
    }
}
