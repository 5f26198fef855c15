//! Certificate rendering over the template PDF

use crate::fields::ResolvedField;
use crate::images::{FsImageLoader, ImageLoader};
use crate::settings::{Align, FieldSettings};
use crate::{CertificateError, Result};
use pdf_core::{Color, FontFamilyBuilder, PageSize, PdfDocument, TextCell, Unit};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// TrueType files of one font family
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FontFiles {
    pub regular: Option<PathBuf>,
    #[serde(default)]
    pub bold: Option<PathBuf>,
    #[serde(default)]
    pub italic: Option<PathBuf>,
    #[serde(default)]
    pub bold_italic: Option<PathBuf>,
}

fn read_font(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        CertificateError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read font {}: {e}", path.display()),
        ))
    })
}

impl FontFiles {
    fn builder(&self) -> Result<FontFamilyBuilder> {
        let mut builder = FontFamilyBuilder::new();
        if let Some(path) = &self.regular {
            builder = builder.regular(read_font(path)?);
        }
        if let Some(path) = &self.bold {
            builder = builder.bold(read_font(path)?);
        }
        if let Some(path) = &self.italic {
            builder = builder.italic(read_font(path)?);
        }
        if let Some(path) = &self.bold_italic {
            builder = builder.bold_italic(read_font(path)?);
        }
        Ok(builder)
    }
}

/// Left edge of an image field
///
/// `pos_x` is the anchor: the left edge, the center or the right edge
/// depending on the field's alignment.
pub fn image_left_edge(settings: &FieldSettings) -> f64 {
    match settings.align {
        Align::Left => settings.pos_x,
        Align::Center => settings.pos_x - settings.width / 2.0,
        Align::Right => settings.pos_x - settings.width,
    }
}

/// Composes resolved fields onto a landscape Letter page
pub struct CertificateRenderer {
    fonts: BTreeMap<String, FontFiles>,
    images: Box<dyn ImageLoader>,
}

impl Default for CertificateRenderer {
    fn default() -> Self {
        Self::new(Box::new(FsImageLoader::new()))
    }
}

impl CertificateRenderer {
    pub fn new(images: Box<dyn ImageLoader>) -> Self {
        Self {
            fonts: BTreeMap::new(),
            images,
        }
    }

    /// Make a TrueType family available to text fields
    pub fn with_font(mut self, family: impl Into<String>, files: FontFiles) -> Self {
        self.fonts.insert(family.into(), files);
        self
    }

    pub fn with_fonts(mut self, fonts: BTreeMap<String, FontFiles>) -> Self {
        self.fonts.extend(fonts);
        self
    }

    fn load_fonts(&self, doc: &mut PdfDocument) -> Result<()> {
        for (family, files) in &self.fonts {
            doc.register_font_family(family, files.builder()?)?;
        }
        Ok(())
    }

    /// Render the fields, in order, over page 1 of the template
    pub fn render(&self, template_path: &Path, fields: &[ResolvedField]) -> Result<Vec<u8>> {
        let template = std::fs::read(template_path)?;

        let mut doc = PdfDocument::new(PageSize::letter().landscape(), Unit::Mm);
        doc.use_template(&template, 1)?;
        self.load_fonts(&mut doc)?;

        for field in fields {
            match field {
                ResolvedField::Image { settings, source } => {
                    self.render_image(&mut doc, settings, source)?
                }
                ResolvedField::Text {
                    settings,
                    text,
                    link,
                } => render_text(&mut doc, settings, text, link.as_deref())?,
            }
        }

        Ok(doc.to_bytes()?)
    }

    fn render_image(&self, doc: &mut PdfDocument, settings: &FieldSettings, source: &str) -> Result<()> {
        let data = self.images.load(source)?;
        let x = image_left_edge(settings);
        let (width, height) = doc.insert_image(&data, x, settings.pos_y, settings.width, None)?;

        tracing::debug!(%source, x, y = settings.pos_y, width, height, "placed image field");
        Ok(())
    }
}

fn render_text(
    doc: &mut PdfDocument,
    settings: &FieldSettings,
    text: &str,
    link: Option<&str>,
) -> Result<()> {
    doc.set_font(&settings.font, &settings.style, settings.size as f32)?;

    let color = match &settings.color {
        Some(hex) => Color::from_hex(hex)?,
        None => Color::black(),
    };
    doc.set_text_color(color);

    let mut cell = TextCell::new(text, settings.pos_x, settings.pos_y, settings.width)
        .align(settings.align.into())
        .border(true);
    if let Some(url) = link {
        cell = cell.link(url);
    }

    let height = doc.multi_cell(&cell)?;
    tracing::debug!(
        x = settings.pos_x,
        y = settings.pos_y,
        width = settings.width,
        height,
        linked = link.is_some(),
        "placed text field"
    );
    Ok(())
}
