use std::fmt;

use clap::ValueEnum;

use qrcode::EcLevel;

use crate::color::Color;

/// Edge length of the processed logo canvas and of the native QR surface.
pub const CANVAS_SIZE: u32 = 2048;

pub const BORDER_PERCENT_MAX: u8 = 25;
pub const PADDING_PERCENT_MAX: u8 = 45;
pub const LOGO_SIZE_MIN: u32 = 200;
pub const LOGO_SIZE_MAX: u32 = 600;
pub const FRAME_TEXT_MAX_CHARS: usize = 15;

pub const DEFAULT_CONTENT: &str = "https://google.com";
pub const DEFAULT_FOREGROUND: Color = Color::rgb(0x02, 0x84, 0xc7);
pub const DEFAULT_BACKGROUND: Color = Color::WHITE;
pub const DEFAULT_LOGO_BACKGROUND: Color = Color::rgb(0xf9, 0x73, 0x16);
pub const DEFAULT_FRAME_TEXT: &str = "SCAN ME";

/// Badge shape behind the logo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum LogoShape {
    #[default]
    #[value(alias = "round")]
    Circle,
    Square,
}

impl LogoShape {
    pub fn name(&self) -> &'static str {
        match self {
            LogoShape::Circle => "circle",
            LogoShape::Square => "square",
        }
    }
}

impl fmt::Display for LogoShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the logo compositor needs besides the source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LogoStyle {
    pub shape: LogoShape,
    pub background_color: Color,
    /// Border ring thickness as a percentage of [`CANVAS_SIZE`] (0–25).
    pub border_width_percent: u8,
    pub border_color: Color,
    /// Gap between the inner shape edge and the logo, as a percentage of the
    /// inner shape (0–45).
    pub padding_percent: u8,
    /// Edge length of the badge inside the 2048px QR surface (200–600).
    pub size_pixels: u32,
}

impl Default for LogoStyle {
    fn default() -> Self {
        Self {
            shape: LogoShape::Circle,
            background_color: DEFAULT_LOGO_BACKGROUND,
            border_width_percent: 6,
            border_color: Color::BLACK,
            padding_percent: 15,
            size_pixels: 480,
        }
    }
}

impl LogoStyle {
    /// Pull every field into its slider range.  The sum of border and padding
    /// is deliberately left alone; see [`crate::ops::logo::LogoLayout`].
    pub fn clamped(mut self) -> Self {
        self.border_width_percent = self.border_width_percent.min(BORDER_PERCENT_MAX);
        self.padding_percent = self.padding_percent.min(PADDING_PERCENT_MAX);
        self.size_pixels = self.size_pixels.clamp(LOGO_SIZE_MIN, LOGO_SIZE_MAX);
        self
    }
}

/// Parameters handed to the QR renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct QrStyle {
    pub content: String,
    pub foreground_color: Color,
    pub background_color: Color,
    /// Always `H` in practice: the logo hides a large share of the modules.
    pub error_correction: EcLevel,
    /// Clear the modules under the logo instead of painting over them.
    pub excavate: bool,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            content: DEFAULT_CONTENT.to_string(),
            foreground_color: DEFAULT_FOREGROUND,
            background_color: DEFAULT_BACKGROUND,
            error_correction: EcLevel::H,
            excavate: true,
        }
    }
}

impl QrStyle {
    /// The string actually encoded.  The encoder rejects empty input, so an
    /// empty content becomes a single space.
    pub fn encoded_content(&self) -> &str {
        if self.content.is_empty() { " " } else { &self.content }
    }
}

/// Frame drawn around (or under) the exported QR.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum FrameVariant {
    /// Rounded banner with a text label below the code.
    #[default]
    #[value(alias = "banner")]
    BottomLabel,
    /// Thick ring around the whole image.
    #[value(alias = "border")]
    FullBorder,
}

impl FrameVariant {
    pub fn name(&self) -> &'static str {
        match self {
            FrameVariant::BottomLabel => "bottom-label",
            FrameVariant::FullBorder => "full-border",
        }
    }
}

impl fmt::Display for FrameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameStyle {
    pub enabled: bool,
    pub text: String,
    pub frame_color: Color,
    pub text_color: Color,
    pub variant: FrameVariant,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            text: DEFAULT_FRAME_TEXT.to_string(),
            frame_color: DEFAULT_FOREGROUND,
            text_color: Color::WHITE,
            variant: FrameVariant::BottomLabel,
        }
    }
}

impl FrameStyle {
    /// Cut the label down to [`FRAME_TEXT_MAX_CHARS`] characters.
    pub fn truncate_text(&mut self) {
        if self.text.chars().count() > FRAME_TEXT_MAX_CHARS {
            self.text = self.text.chars().take(FRAME_TEXT_MAX_CHARS).collect();
        }
    }

    /// The text as rendered on the banner: truncated, then uppercased.
    pub fn label_text(&self) -> String {
        self.text
            .chars()
            .take(FRAME_TEXT_MAX_CHARS)
            .collect::<String>()
            .to_uppercase()
    }

    pub fn is_banner(&self) -> bool {
        self.enabled && self.variant == FrameVariant::BottomLabel
    }
}
