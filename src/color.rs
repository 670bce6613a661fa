use std::fmt;
use std::str::FromStr;

use image::Rgba;

/// An sRGB color with straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b, 255])
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.  The `#` is optional and hex
    /// digits are case-insensitive.
    pub fn parse_hex(input: &str) -> Result<Self, ColorParseError> {
        let hex = input.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(input.to_string()));
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).unwrap_or(0);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);

        match hex.len() {
            3 => Ok(Color([nibble(0) * 17, nibble(1) * 17, nibble(2) * 17, 255])),
            6 => Ok(Color([byte(0), byte(2), byte(4), 255])),
            8 => Ok(Color([byte(0), byte(2), byte(4), byte(6)])),
            _ => Err(ColorParseError::InvalidLength(input.to_string())),
        }
    }

    /// Lowercase `#rrggbb`, or `#rrggbbaa` when the color is not opaque.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }

    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba(self.0)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Why a color string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    InvalidLength(String),
    InvalidDigit(String),
}

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorParseError::InvalidLength(s) => {
                write!(f, "invalid color '{}': expected #rgb, #rrggbb or #rrggbbaa", s)
            }
            ColorParseError::InvalidDigit(s) => {
                write!(f, "invalid color '{}': not a hex value", s)
            }
        }
    }
}

impl std::error::Error for ColorParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        assert_eq!(Color::parse_hex("#0284c7").unwrap(), Color::rgb(0x02, 0x84, 0xc7));
        assert_eq!(Color::parse_hex("F97316").unwrap(), Color::rgb(0xf9, 0x73, 0x16));
    }

    #[test]
    fn parses_short_and_alpha_forms() {
        assert_eq!(Color::parse_hex("#fff").unwrap(), Color::WHITE);
        assert_eq!(
            Color::parse_hex("#3b82f680").unwrap(),
            Color([0x3b, 0x82, 0xf6, 0x80])
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Color::parse_hex("#12345"),
            Err(ColorParseError::InvalidLength(_))
        ));
        assert!(matches!(
            Color::parse_hex("#gg0000"),
            Err(ColorParseError::InvalidDigit(_))
        ));
        assert!(Color::parse_hex("").is_err());
    }

    #[test]
    fn formats_back_to_lowercase_hex() {
        assert_eq!(Color::rgb(0x3B, 0x82, 0xF6).to_string(), "#3b82f6");
        assert_eq!(Color([1, 2, 3, 4]).to_hex(), "#01020304");
    }
}
