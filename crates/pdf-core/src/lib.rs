//! PDF Core - Low-level PDF composition
//!
//! This crate provides functionality for:
//! - Creating a single-page document of a given size and unit system
//! - Importing a page of an existing PDF as a background template
//! - Standard (non-embedded) and embedded TrueType fonts
//! - Wrapped, bordered text cells at absolute positions
//! - Inserting images (JPEG, PNG) scaled to a width
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{Align, Color, PageSize, PdfDocument, TextCell, Unit};
//!
//! let mut doc = PdfDocument::new(PageSize::letter().landscape(), Unit::Mm);
//! doc.use_template(&std::fs::read("template.pdf")?, 1)?;
//! doc.set_font("helvetica", "B", 24.0)?;
//! doc.set_text_color(Color::from_hex("#336699")?);
//! doc.multi_cell(&TextCell::new("Jane Doe", 40.0, 90.0, 200.0).align(Align::Center))?;
//! let bytes = doc.to_bytes()?;
//! ```

mod color;
mod document;
mod font;
mod image;
mod standard;
mod template;
mod text;

pub use color::Color;
pub use document::{PdfDocument, TextCell};
pub use font::{FontData, FontFace, FontFamily, FontFamilyBuilder, FontStyle, FontWeight};
pub use image::ImageScaleMode;
pub use standard::StandardFont;
pub use text::{generate_text_operators, wrap_text, TextRenderContext};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Font already exists: {0}")]
    FontAlreadyExists(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Horizontal alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// User unit for coordinates and widths. Font sizes are always in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unit {
    Pt,
    #[default]
    Mm,
}

impl Unit {
    /// Points per user unit
    pub fn scale(self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
        }
    }
}

/// Page size in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// US Letter, portrait (8.5 x 11 in)
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }

    /// Same size with the long edge horizontal
    pub fn landscape(self) -> Self {
        Self {
            width: self.width.max(self.height),
            height: self.width.min(self.height),
        }
    }
}
