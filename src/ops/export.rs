//! Final export: crop the QR surface to a thin quiet zone and add the frame.
//!
//! All proportions are relative to the native QR size `N` so the exported
//! image looks the same at any resolution.

use ab_glyph::FontArc;
use image::RgbaImage;

use super::shapes::{draw_shape, CornerRadii, PlacedShape, ShapeKind};
use super::text::draw_text_line;
use super::{fill, overlay};
use crate::color::Color;
use crate::style::{FrameStyle, FrameVariant};

/// Quiet zone on every side, % of N.  About two modules; well under the
/// standard four but still read reliably.
pub const MARGIN_PERCENT: f64 = 4.0;
/// Banner height below the code, % of N.
pub const LABEL_PERCENT: f64 = 28.0;
/// How far the banner tucks up under the code, % of N.
pub const BANNER_OVERLAP_PERCENT: f64 = 3.0;
pub const BANNER_RADIUS_PERCENT: f64 = 4.0;
pub const LABEL_FONT_PERCENT: f64 = 11.0;
/// Optical nudge down for the label baseline, % of N.
pub const LABEL_NUDGE_PERCENT: f64 = 1.0;
/// Border stroke width as a multiple of the margin.
pub const BORDER_STROKE_FACTOR: f64 = 1.6;

pub const EXPORT_FILE_PREFIX: &str = "qr-tight-studio";

#[inline]
fn pct(n: f64, percent: f64) -> f64 {
    n * percent / 100.0
}

/// Canvas dimensions are whole pixels; fractional sizes truncate.
#[inline]
fn canvas_extent(v: f64) -> u32 {
    v.max(0.0).floor() as u32
}

/// Rounded banner holding the label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BannerLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub radius: f64,
    pub font_size: f64,
    /// Label anchor: horizontal centre and em-box middle.
    pub text_x: f64,
    pub text_y: f64,
}

/// Stroked ring around the whole export.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BorderLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub line_width: f64,
}

/// Every number the export draws with, computed up front.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportGeometry {
    pub qr_size: f64,
    pub margin: f64,
    pub label_height: f64,
    pub width: u32,
    pub height: u32,
    /// Top-left of the QR surface on the export canvas (both axes).
    pub qr_offset: i64,
    pub banner: Option<BannerLayout>,
    pub border: Option<BorderLayout>,
}

impl ExportGeometry {
    pub fn compute(qr_size: u32, frame: &FrameStyle) -> Self {
        let n = qr_size as f64;
        let margin = pct(n, MARGIN_PERCENT);
        let label_height = if frame.is_banner() { pct(n, LABEL_PERCENT) } else { 0.0 };

        let width = canvas_extent(n + margin * 2.0);
        let height = canvas_extent(n + margin * 2.0 + label_height);

        let banner = frame.is_banner().then(|| {
            let overlap = pct(n, BANNER_OVERLAP_PERCENT);
            let y = margin + n - overlap;
            let h = label_height + overlap;
            BannerLayout {
                x: margin,
                y,
                width: n,
                height: h,
                radius: pct(n, BANNER_RADIUS_PERCENT),
                font_size: pct(n, LABEL_FONT_PERCENT),
                text_x: width as f64 / 2.0,
                text_y: y + h / 2.0 + pct(n, LABEL_NUDGE_PERCENT),
            }
        });

        let border = (frame.enabled && frame.variant == FrameVariant::FullBorder).then(|| BorderLayout {
            x: margin / 2.0,
            y: margin / 2.0,
            width: width as f64 - margin,
            height: height as f64 - margin,
            line_width: margin * BORDER_STROKE_FACTOR,
        });

        Self {
            qr_size: n,
            margin,
            label_height,
            width,
            height,
            qr_offset: margin.round() as i64,
            banner,
            border,
        }
    }
}

/// Compose the downloadable image.
///
/// Returns `None` when there is no QR surface yet, or when the surface is not
/// square; nothing is drawn in either case.
pub fn export_image(
    qr: Option<&RgbaImage>,
    background: Color,
    frame: &FrameStyle,
    font: Option<&FontArc>,
) -> Option<RgbaImage> {
    let Some(qr) = qr else {
        log_info!("export requested before the QR surface was rendered; skipped");
        return None;
    };
    if qr.width() != qr.height() || qr.width() == 0 {
        log_warn!("QR surface is {}x{}, expected a square; export skipped", qr.width(), qr.height());
        return None;
    }

    let geo = ExportGeometry::compute(qr.width(), frame);
    let mut canvas = RgbaImage::new(geo.width, geo.height);
    fill(&mut canvas, background.to_rgba());

    if let Some(banner) = &geo.banner {
        draw_shape(
            &mut canvas,
            &PlacedShape::filled_rect(
                ShapeKind::RoundedRect(CornerRadii::bottom(banner.radius as f32)),
                banner.x as f32,
                banner.y as f32,
                banner.width as f32,
                banner.height as f32,
                frame.frame_color.0,
            ),
        );

        let label = frame.label_text();
        match font {
            Some(font) if !label.is_empty() => draw_text_line(
                &mut canvas,
                font,
                &label,
                banner.font_size as f32,
                banner.text_x as f32,
                banner.text_y as f32,
                frame.text_color.0,
            ),
            Some(_) => {}
            None => log_warn!("no font loaded; banner label '{}' not drawn", label),
        }
    }

    if let Some(border) = &geo.border {
        draw_shape(
            &mut canvas,
            &PlacedShape::stroked_rect(
                border.x as f32,
                border.y as f32,
                border.width as f32,
                border.height as f32,
                border.line_width as f32,
                frame.frame_color.0,
            ),
        );
    }

    overlay(&mut canvas, qr, geo.qr_offset, geo.qr_offset);
    Some(canvas)
}

/// `qr-tight-studio-<unix-millis>.png`
pub fn export_file_name(unix_millis: u128) -> String {
    format!("{}-{}.png", EXPORT_FILE_PREFIX, unix_millis)
}

/// Milliseconds since the Unix epoch (0 if the clock is before 1970).
pub fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
