//! RGB colors

use crate::{PdfError, Result};

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create color from RGB values (0-255)
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Parse a packed hex color: `rgb` or `rrggbb`, with or without a leading `#`
    ///
    /// Shorthand digits are doubled, so `"f00"` and `"ff0000"` are the same color.
    ///
    /// # Example
    /// ```ignore
    /// assert_eq!(Color::from_hex("#f00")?.to_rgb8(), (255, 0, 0));
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PdfError::InvalidColor(hex.to_string()));
        }

        let channel = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| PdfError::InvalidColor(hex.to_string()))
        };

        match digits.len() {
            3 => {
                let doubled: Vec<String> = digits.chars().map(|c| format!("{c}{c}")).collect();
                Ok(Self::from_rgb(
                    channel(&doubled[0])?,
                    channel(&doubled[1])?,
                    channel(&doubled[2])?,
                ))
            }
            6 => Ok(Self::from_rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(PdfError::InvalidColor(hex.to_string())),
        }
    }

    /// Color as 0-255 channels
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (to_u8(self.r), to_u8(self.g), to_u8(self.b))
    }

    /// Black color
    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    /// White color
    pub fn white() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}
