use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::RgbaImage;
use std::path::Path;

use super::blend_buffer;

/// Family tried first for the banner label; the geometric sans the label was
/// designed around.
pub const BANNER_FONT_FAMILY: &str = "Inter";
/// CSS-style weight of the banner label (Black).
pub const BANNER_FONT_WEIGHT: u16 = 900;

/// Lay out a single line of text, returning positioned glyphs and metrics.
/// Returns `(glyphs, total_width, ascent, descent)`; glyph positions are
/// relative to the horizontal centre of the line, on the baseline.
pub fn layout_text(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32, f32, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    let total_width = cursor_x;
    let offset = -total_width * 0.5;
    for glyph in &mut glyphs {
        glyph.1 += offset;
    }

    (glyphs, total_width, ascent, descent)
}

/// Result of rasterizing one line: an RGBA buffer and where it goes.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    fn empty() -> Self {
        Self { buf: Vec::new(), buf_w: 0, buf_h: 0, off_x: 0, off_y: 0 }
    }
}

/// Rasterize one line of text into an RGBA buffer clipped to the canvas.
///
/// `(center_x, baseline_y)` is the horizontal centre of the line on the baseline.
pub fn rasterize_line(
    font: &FontArc,
    text: &str,
    font_size: f32,
    center_x: f32,
    baseline_y: f32,
    color: [u8; 4],
    canvas_w: u32,
    canvas_h: u32,
) -> RasterizedText {
    let (glyphs, _, _, _) = layout_text(font, text, font_size);

    let outlined: Vec<_> = glyphs
        .iter()
        .filter_map(|&(id, gx)| {
            font.outline_glyph(id.with_scale_and_position(font_size, point(center_x + gx, baseline_y)))
        })
        .collect();
    if outlined.is_empty() {
        return RasterizedText::empty();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in &outlined {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let x0 = (min_x.floor() as i32).max(0);
    let y0 = (min_y.floor() as i32).max(0);
    let x1 = (max_x.ceil() as i32).min(canvas_w as i32);
    let y1 = (max_y.ceil() as i32).min(canvas_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return RasterizedText::empty();
    }

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for g in &outlined {
        let b = g.px_bounds();
        g.draw(|px, py, cov| {
            let ix = px as i32 + b.min.x as i32 - x0;
            let iy = py as i32 + b.min.y as i32 - y0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                // Overlapping glyph edges: keep the stronger coverage
                coverage[idx] = coverage[idx].max(cov.min(1.0));
            }
        });
    }

    let mut buf = vec![0u8; coverage.len() * 4];
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            let idx = i * 4;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = (color[3] as f32 * cov).round().min(255.0) as u8;
        }
    }

    RasterizedText { buf, buf_w, buf_h, off_x: x0, off_y: y0 }
}

/// Draw one line of text onto `canvas`, centred on `x`, with the vertical
/// anchor at the middle of the em box (canvas `textBaseline = "middle"`).
pub fn draw_text_line(
    canvas: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    font_size: f32,
    x: f32,
    middle_y: f32,
    color: [u8; 4],
) {
    let scaled = font.as_scaled(font_size);
    // ascent > 0, descent < 0: the em middle sits (ascent + descent) / 2 above the baseline
    let baseline_y = middle_y + (scaled.ascent() + scaled.descent()) * 0.5;
    let raster = rasterize_line(
        font,
        text,
        font_size,
        x,
        baseline_y,
        color,
        canvas.width(),
        canvas.height(),
    );
    blend_buffer(canvas, raster.buf, raster.buf_w, raster.buf_h, raster.off_x, raster.off_y);
}

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (100=Thin, 400=Regular, 700=Bold, etc.)
/// Returns None if the font cannot be found.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let family = match family {
        "sans-serif" => FamilyName::SansSerif,
        "serif" => FamilyName::Serif,
        "monospace" => FamilyName::Monospace,
        name => FamilyName::Title(name.to_string()),
    };

    let source = SystemSource::new();
    let handle = source.select_best_match(&[family], &props).ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Load a TTF/OTF file from disk.
pub fn load_font_file(path: &Path) -> Result<FontArc, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("could not read font '{}': {}", path.display(), e))?;
    FontArc::try_from_vec(bytes).map_err(|e| format!("invalid font '{}': {}", path.display(), e))
}

/// Pick the font for the banner label.
///
/// Order: explicit file, the banner family at weight 900, any sans-serif at
/// weight 900.  `None` means the label is skipped.
pub fn load_banner_font(override_path: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = override_path {
        match load_font_file(path) {
            Ok(font) => return Some(font),
            Err(e) => log_warn!("{}; falling back to system fonts", e),
        }
    }

    let font = load_system_font(BANNER_FONT_FAMILY, BANNER_FONT_WEIGHT, false)
        .or_else(|| load_system_font("sans-serif", BANNER_FONT_WEIGHT, false));
    if font.is_none() {
        log_warn!("no system font available for the banner label");
    }
    font
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_is_an_error() {
        let err = load_font_file(Path::new("/definitely/not/here.ttf")).unwrap_err();
        assert!(err.contains("could not read font"));
    }

    #[test]
    fn garbage_font_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(load_font_file(&path).unwrap_err().contains("invalid font"));
    }

    #[test]
    fn system_font_renders_centered_text() {
        // Only meaningful on machines with fonts installed
        let Some(font) = load_system_font("sans-serif", 700, false) else {
            return;
        };
        let mut canvas = RgbaImage::new(200, 80);
        draw_text_line(&mut canvas, &font, "SCAN ME", 30.0, 100.0, 40.0, [0, 0, 0, 255]);

        let inked: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty());

        let min_x = inked.iter().map(|p| p.0).min().unwrap();
        let max_x = inked.iter().map(|p| p.0).max().unwrap();
        let mid = (min_x + max_x) as f32 / 2.0;
        assert!((mid - 100.0).abs() < 6.0, "text centre {} not near 100", mid);
    }
}
