//! Font handling for PDF documents

use crate::standard::StandardFont;
use crate::{PdfError, Result};
use lopdf::{Dictionary, Object, Stream};
use std::collections::BTreeSet;

/// Font weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Font style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Embedded TrueType font data
#[derive(Debug, Clone)]
pub struct FontData {
    /// Font name/identifier
    pub name: String,
    /// Raw TTF data
    pub ttf_data: Vec<u8>,
    /// Characters used (for the widths array and ToUnicode map)
    pub used_chars: BTreeSet<char>,
}

/// PDF objects generated for font embedding
pub struct FontObjects {
    /// Type0 font dictionary
    pub type0_font: Dictionary,
    /// CIDFont Type2 dictionary
    pub cid_font: Dictionary,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Font file stream (TTF data)
    pub font_file_stream: Stream,
    /// ToUnicode CMap stream
    pub tounicode_stream: Stream,
}

/// A font usable for text: either a standard font or an embedded TrueType font
#[derive(Debug, Clone)]
pub enum FontFace {
    Standard(StandardFont),
    Embedded(FontData),
}

impl FontFace {
    /// Unique name of this face within a document
    pub fn name(&self) -> &str {
        match self {
            FontFace::Standard(font) => font.base_font(),
            FontFace::Embedded(data) => &data.name,
        }
    }

    /// Text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        match self {
            FontFace::Standard(font) => font.text_width_points(text, font_size),
            FontFace::Embedded(data) => data.text_width_points(text, font_size),
        }
    }

    /// Hex string operand for the Tj operator
    pub fn encode_text_hex(&self, text: &str) -> String {
        match self {
            FontFace::Standard(font) => font.encode_text_hex(text),
            FontFace::Embedded(data) => data.encode_text_hex(text),
        }
    }

    /// Ascent and descent as fractions of the font size (descent is negative)
    pub fn vertical_metrics(&self) -> (f32, f32) {
        match self {
            FontFace::Standard(_) => (0.8, -0.2),
            FontFace::Embedded(data) => {
                let upm = data.units_per_em() as f32;
                (data.ascender() as f32 / upm, data.descender() as f32 / upm)
            }
        }
    }

    /// Record characters drawn with this face
    pub fn add_chars(&mut self, text: &str) {
        if let FontFace::Embedded(data) = self {
            data.add_chars(text);
        }
    }
}

/// Font family with variants
#[derive(Debug, Clone, Default)]
pub struct FontFamily {
    /// Regular variant (required)
    pub regular: Option<FontFace>,
    /// Bold variant
    pub bold: Option<FontFace>,
    /// Italic variant
    pub italic: Option<FontFace>,
    /// Bold italic variant
    pub bold_italic: Option<FontFace>,
}

impl FontFamily {
    /// Standard font family for a name such as `helvetica`, `times` or `courier`
    pub fn standard(family: &str) -> Option<Self> {
        let face = |bold, italic| StandardFont::from_family(family, bold, italic).map(FontFace::Standard);
        Some(Self {
            regular: Some(face(false, false)?),
            bold: face(true, false),
            italic: face(false, true),
            bold_italic: face(true, true),
        })
    }

    /// Get the font face for the specified weight and style
    /// Falls back to regular if requested variant is not available
    pub fn get_variant(&self, weight: FontWeight, style: FontStyle) -> Option<&FontFace> {
        match (weight, style) {
            (FontWeight::Bold, FontStyle::Italic) => self
                .bold_italic
                .as_ref()
                .or(self.bold.as_ref())
                .or(self.italic.as_ref())
                .or(self.regular.as_ref()),
            (FontWeight::Bold, FontStyle::Normal) => self.bold.as_ref().or(self.regular.as_ref()),
            (FontWeight::Regular, FontStyle::Italic) => {
                self.italic.as_ref().or(self.regular.as_ref())
            }
            (FontWeight::Regular, FontStyle::Normal) => self.regular.as_ref(),
        }
    }

    /// All variants present in this family
    pub fn variants(&self) -> impl Iterator<Item = &FontFace> {
        [&self.regular, &self.bold, &self.italic, &self.bold_italic]
            .into_iter()
            .flatten()
    }

    /// Mutable access to the variant with the given face name
    pub fn variant_named_mut(&mut self, name: &str) -> Option<&mut FontFace> {
        [
            &mut self.regular,
            &mut self.bold,
            &mut self.italic,
            &mut self.bold_italic,
        ]
        .into_iter()
        .flatten()
        .find(|face| face.name() == name)
    }
}

/// Builder for registering TrueType font families
pub struct FontFamilyBuilder {
    regular: Option<Vec<u8>>,
    bold: Option<Vec<u8>>,
    italic: Option<Vec<u8>>,
    bold_italic: Option<Vec<u8>>,
}

impl FontFamilyBuilder {
    pub fn new() -> Self {
        Self {
            regular: None,
            bold: None,
            italic: None,
            bold_italic: None,
        }
    }

    pub fn regular(mut self, ttf_data: Vec<u8>) -> Self {
        self.regular = Some(ttf_data);
        self
    }

    pub fn bold(mut self, ttf_data: Vec<u8>) -> Self {
        self.bold = Some(ttf_data);
        self
    }

    pub fn italic(mut self, ttf_data: Vec<u8>) -> Self {
        self.italic = Some(ttf_data);
        self
    }

    pub fn bold_italic(mut self, ttf_data: Vec<u8>) -> Self {
        self.bold_italic = Some(ttf_data);
        self
    }

    /// Build the FontFamily from the provided TTF data
    pub fn build(self, family_name: &str) -> Result<FontFamily> {
        let embed = |data: Vec<u8>, suffix: &str| {
            FontData::from_ttf(&format!("{family_name}-{suffix}"), data).map(FontFace::Embedded)
        };

        let Some(regular) = self.regular else {
            return Err(PdfError::FontParseError(
                "FontFamily must have at least a regular variant".to_string(),
            ));
        };

        Ok(FontFamily {
            regular: Some(embed(regular, "regular")?),
            bold: self.bold.map(|data| embed(data, "bold")).transpose()?,
            italic: self.italic.map(|data| embed(data, "italic")).transpose()?,
            bold_italic: self
                .bold_italic
                .map(|data| embed(data, "bold-italic"))
                .transpose()?,
        })
    }
}

impl Default for FontFamilyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FontData {
    /// Create font data from TTF bytes
    ///
    /// # Arguments
    /// * `name` - Font identifier
    /// * `ttf_data` - TrueType font file bytes
    pub fn from_ttf(name: &str, ttf_data: Vec<u8>) -> Result<Self> {
        ttf_parser::Face::parse(&ttf_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{name}: {e:?}")))?;

        Ok(Self {
            name: name.to_string(),
            ttf_data,
            used_chars: BTreeSet::new(),
        })
    }

    /// Parsed face, if the data is a valid font
    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.ttf_data, 0).ok()
    }

    /// Add characters to the used set
    pub fn add_chars(&mut self, text: &str) {
        self.used_chars.extend(text.chars());
    }

    /// Get glyph ID for a character
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.face()
            .and_then(|face| face.glyph_index(c).map(|id| id.0))
    }

    /// Get font units per em
    pub fn units_per_em(&self) -> u16 {
        self.face()
            .map(|face| face.units_per_em())
            .unwrap_or(1000)
    }

    /// Get font ascender
    pub fn ascender(&self) -> i16 {
        self.face().map(|face| face.ascender()).unwrap_or(800)
    }

    /// Get font descender
    pub fn descender(&self) -> i16 {
        self.face().map(|face| face.descender()).unwrap_or(-200)
    }

    /// Calculate text width in font units
    pub fn text_width(&self, text: &str) -> u32 {
        let Some(face) = self.face() else {
            return 0;
        };
        text.chars()
            .filter_map(|c| face.glyph_index(c))
            .filter_map(|gid| face.glyph_hor_advance(gid))
            .map(|w| w as u32)
            .sum()
    }

    /// Calculate text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let width = self.text_width(text);
        let units_per_em = self.units_per_em() as f32;
        (width as f32 / units_per_em) * font_size
    }

    /// Encode text as hex glyph IDs for the Tj operator (Identity-H)
    pub fn encode_text_hex(&self, text: &str) -> String {
        let mut result = String::new();
        for c in text.chars() {
            let gid = self.glyph_id(c).unwrap_or(0);
            result.push_str(&format!("{gid:04X}"));
        }
        format!("<{result}>")
    }

    /// Generate all PDF objects needed to embed this font
    pub fn to_pdf_objects(&self) -> FontObjects {
        let font_name = Object::Name(self.name.clone().into());

        let tounicode_content = self.generate_tounicode_cmap();
        let tounicode_stream = Stream::new(
            Dictionary::from_iter(vec![("Type", "CMap".into())]),
            tounicode_content.into_bytes(),
        );

        let font_file_stream = Stream::new(
            Dictionary::from_iter(vec![("Length1", (self.ttf_data.len() as i64).into())]),
            self.ttf_data.clone(),
        );

        let units_per_em = self.units_per_em() as i64;
        let ascender = self.ascender() as i64;
        let descender = self.descender() as i64;

        let font_bbox: Vec<Object> = vec![
            0.into(),
            descender.into(),
            units_per_em.into(),
            ascender.into(),
        ];

        let font_descriptor = Dictionary::from_iter(vec![
            ("Type", "FontDescriptor".into()),
            ("FontName", font_name.clone()),
            ("Flags", 4.into()), // Symbolic font
            ("FontBBox", font_bbox.into()),
            ("ItalicAngle", 0.into()),
            ("Ascent", ascender.into()),
            ("Descent", descender.into()),
            ("CapHeight", ascender.into()),
            ("StemV", 80.into()),
        ]);

        let cid_system_info = Dictionary::from_iter(vec![
            ("Registry", Object::string_literal("Adobe")),
            ("Ordering", Object::string_literal("Identity")),
            ("Supplement", 0.into()),
        ]);

        let cid_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "CIDFontType2".into()),
            ("BaseFont", font_name.clone()),
            ("CIDSystemInfo", cid_system_info.into()),
            ("CIDToGIDMap", "Identity".into()),
            ("W", self.generate_widths_array().into()),
            ("DW", 1000.into()),
        ]);

        // DescendantFonts and ToUnicode are linked when the objects are added
        let type0_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type0".into()),
            ("BaseFont", font_name),
            ("Encoding", "Identity-H".into()),
        ]);

        FontObjects {
            type0_font,
            cid_font,
            font_descriptor,
            font_file_stream,
            tounicode_stream,
        }
    }

    /// Generate /W array for glyph widths
    fn generate_widths_array(&self) -> Vec<Object> {
        let mut widths = Vec::new();
        let Some(face) = self.face() else {
            return widths;
        };

        let mut gids: Vec<u16> = self
            .used_chars
            .iter()
            .filter_map(|&c| face.glyph_index(c).map(|id| id.0))
            .collect();
        gids.sort();
        gids.dedup();

        // Individual mapping format: [gid1 [width1] gid2 [width2] ...]
        let scale = 1000.0 / face.units_per_em() as f64;
        for gid in gids {
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(gid))
                .map(|w| (w as f64 * scale).round() as i64)
                .unwrap_or(1000);
            widths.push((gid as i64).into());
            widths.push(vec![Object::Integer(advance)].into());
        }

        widths
    }

    /// Generate ToUnicode CMap stream content
    fn generate_tounicode_cmap(&self) -> String {
        let mut cmap = String::new();

        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");

        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        let char_list: Vec<char> = self.used_chars.iter().copied().collect();

        // bfchar sections are limited to 100 entries
        for chunk in char_list.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for c in chunk {
                let gid = self.glyph_id(*c).unwrap_or(0);
                let mut utf16 = [0u16; 2];
                let unicode: String = c
                    .encode_utf16(&mut utf16)
                    .iter()
                    .map(|unit| format!("{unit:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{unicode}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");

        cmap
    }
}
