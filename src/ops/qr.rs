//! QR surface renderer.  The module matrix comes from the `qrcode` crate; this
//! file paints it at the fixed native resolution, clears the modules behind the
//! logo when asked, and stamps the processed logo in the middle.

use image::imageops::FilterType;
use image::RgbaImage;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use rayon::prelude::*;

use super::overlay;
use crate::style::{QrStyle, CANVAS_SIZE};

/// Pixel size of the rendered QR surface, independent of any preview scale.
pub const QR_NATIVE_SIZE: u32 = CANVAS_SIZE;

/// Logo stamped into the middle of the code.
#[derive(Clone, Copy, Debug)]
pub struct EmbeddedLogo<'a> {
    pub image: &'a RgbaImage,
    /// Drawn edge length in surface pixels.
    pub size: u32,
    /// Clear the modules behind the logo instead of painting over them.
    pub excavate: bool,
}

/// Block of modules cleared behind the logo, in module units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Excavation {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Excavation {
    /// Modules touched by a centred `logo_size`² square on a `surface_size`²
    /// rendering of a `cells`-wide matrix.  Partially covered modules count.
    pub fn centered(cells: usize, logo_size: u32, surface_size: u32) -> Self {
        let scale = cells as f32 / surface_size as f32;
        let w = logo_size as f32 * scale;
        let x = cells as f32 / 2.0 - w / 2.0;

        let floor_x = x.floor().max(0.0);
        let ceil_w = (w + x - floor_x).ceil().max(0.0);
        let start = (floor_x as usize).min(cells);
        let span = (ceil_w as usize).min(cells - start);

        Self { x: start, y: start, w: span, h: span }
    }
}

/// Why the QR surface could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrRenderError {
    /// Content does not fit in a version-40 code at the chosen level.
    DataTooLong { bytes: usize },
    Encode(String),
}

impl std::fmt::Display for QrRenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QrRenderError::DataTooLong { bytes } => {
                write!(f, "content too long for a QR code ({} bytes)", bytes)
            }
            QrRenderError::Encode(e) => write!(f, "QR encoding error: {}", e),
        }
    }
}

impl std::error::Error for QrRenderError {}

/// Square grid of dark/light modules, no quiet zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(content: &str, level: EcLevel) -> Result<Self, QrRenderError> {
        let code = QrCode::with_error_correction_level(content.as_bytes(), level).map_err(|e| match e {
            QrError::DataTooLong => QrRenderError::DataTooLong { bytes: content.len() },
            other => QrRenderError::Encode(other.to_string()),
        })?;
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();
        Ok(Self { width: code.width(), dark })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.dark[y * self.width + x]
    }

    /// Force every module inside `area` to light.
    pub fn excavate(&mut self, area: &Excavation) {
        for y in area.y..(area.y + area.h).min(self.width) {
            for x in area.x..(area.x + area.w).min(self.width) {
                self.dark[y * self.width + x] = false;
            }
        }
    }

    /// Paint the matrix edge-to-edge onto a `size`² surface.  Each pixel takes
    /// the module its centre falls in.
    pub fn render(&self, size: u32, foreground: [u8; 4], background: [u8; 4]) -> RgbaImage {
        let cells = self.width;
        let row_bytes = size as usize * 4;
        let mut buf = vec![0u8; row_bytes * size as usize];
        let per_px = cells as f32 / size as f32;

        buf.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(row, row_buf)| {
                let my = (((row as f32 + 0.5) * per_px) as usize).min(cells - 1);
                for col in 0..size as usize {
                    let mx = (((col as f32 + 0.5) * per_px) as usize).min(cells - 1);
                    let color = if self.is_dark(mx, my) { foreground } else { background };
                    row_buf[col * 4..col * 4 + 4].copy_from_slice(&color);
                }
            });

        RgbaImage::from_raw(size, size, buf).unwrap_or_else(|| RgbaImage::new(size, size))
    }
}

/// Render the QR surface for `style` at [`QR_NATIVE_SIZE`], with `logo`
/// stamped in the centre when present.
pub fn render_qr(style: &QrStyle, logo: Option<EmbeddedLogo<'_>>) -> Result<RgbaImage, QrRenderError> {
    let mut matrix = QrMatrix::encode(style.encoded_content(), style.error_correction)?;

    if let Some(logo) = &logo
        && logo.excavate
    {
        let area = Excavation::centered(matrix.width(), logo.size, QR_NATIVE_SIZE);
        matrix.excavate(&area);
    }

    let mut surface = matrix.render(
        QR_NATIVE_SIZE,
        style.foreground_color.0,
        style.background_color.0,
    );

    if let Some(logo) = logo
        && logo.size > 0
    {
        let badge = image::imageops::resize(logo.image, logo.size, logo.size, FilterType::Lanczos3);
        let offset = ((QR_NATIVE_SIZE as f32 - logo.size as f32) / 2.0).round() as i64;
        overlay(&mut surface, &badge, offset, offset);
    }

    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use image::Rgba;

    #[test]
    fn renders_native_size_with_both_colors() {
        let style = QrStyle::default();
        let surface = render_qr(&style, None).unwrap();
        assert_eq!(surface.dimensions(), (QR_NATIVE_SIZE, QR_NATIVE_SIZE));

        let fg = style.foreground_color.to_rgba();
        let bg = style.background_color.to_rgba();
        // Finder pattern: top-left module is dark, no quiet zone
        assert_eq!(*surface.get_pixel(0, 0), fg);
        assert!(surface.pixels().any(|p| *p == bg));
    }

    #[test]
    fn empty_content_still_renders() {
        let style = QrStyle { content: String::new(), ..QrStyle::default() };
        assert!(render_qr(&style, None).is_ok());
    }

    #[test]
    fn oversized_content_is_reported() {
        let style = QrStyle { content: "x".repeat(4000), ..QrStyle::default() };
        assert_eq!(
            render_qr(&style, None).unwrap_err(),
            QrRenderError::DataTooLong { bytes: 4000 }
        );
    }

    #[test]
    fn excavation_covers_partially_hit_modules() {
        // 25 modules over 2048px, 480px logo: w = 5.859, x = 9.57
        let area = Excavation::centered(25, 480, 2048);
        assert_eq!(area, Excavation { x: 9, y: 9, w: 7, h: 7 });
    }

    #[test]
    fn excavation_never_leaves_the_matrix() {
        let area = Excavation::centered(21, 4096, 2048);
        assert_eq!(area.x, 0);
        assert!(area.x + area.w <= 21);
    }

    #[test]
    fn excavate_clears_modules_under_logo() {
        let mut matrix = QrMatrix::encode("https://example.com", EcLevel::H).unwrap();
        let area = Excavation::centered(matrix.width(), 600, 2048);
        matrix.excavate(&area);
        for y in area.y..area.y + area.h {
            for x in area.x..area.x + area.w {
                assert!(!matrix.is_dark(x, y));
            }
        }
    }

    #[test]
    fn logo_is_stamped_in_the_centre() {
        let style = QrStyle {
            foreground_color: Color::BLACK,
            background_color: Color::WHITE,
            ..QrStyle::default()
        };
        let badge = RgbaImage::from_pixel(2048, 2048, Rgba([255, 0, 0, 255]));
        let logo = EmbeddedLogo { image: &badge, size: 400, excavate: true };
        let surface = render_qr(&style, Some(logo)).unwrap();

        let center = surface.get_pixel(1024, 1024);
        assert!(center[0] > 250 && center[1] < 5 && center[2] < 5);
        // Outside the stamp the code is untouched
        assert_eq!(*surface.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }
}
