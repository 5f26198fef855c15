//! Single-page PDF composition

use crate::image::{
    calculate_scaled_dimensions, generate_image_operators, ImageScaleMode, ImageXObject,
};
use crate::template::import_page;
use crate::text::{
    generate_text_operators, horizontal_line_operators, rectangle_operators, wrap_text,
    TextRenderContext,
};
use crate::{
    Align, Color, FontFace, FontFamily, FontFamilyBuilder, FontStyle, FontWeight, PageSize,
    PdfError, Result, Unit,
};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Horizontal padding inside a text cell, in points
const CELL_PADDING_PT: f64 = 2.835;
/// Cell border width, in points
const BORDER_WIDTH_PT: f64 = 0.567;
/// Line height as a multiple of the font size
const LINE_HEIGHT_RATIO: f64 = 1.25;

/// A block of text laid out in a fixed-width box
///
/// Coordinates and width are in the document's user unit, measured from the
/// top-left corner of the page. The cell grows downward to fit its lines.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub align: Align,
    pub border: bool,
    pub link: Option<String>,
}

impl TextCell {
    pub fn new(text: impl Into<String>, x: f64, y: f64, width: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            align: Align::Left,
            border: false,
            link: None,
        }
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    /// Draw a thin black frame around the cell
    pub fn border(mut self, border: bool) -> Self {
        self.border = border;
        self
    }

    /// Make the whole cell a hyperlink to `url`
    pub fn link(mut self, url: impl Into<String>) -> Self {
        self.link = Some(url.into());
        self
    }
}

/// Active font selection
#[derive(Debug, Clone)]
struct FontSelection {
    family: String,
    weight: FontWeight,
    style: FontStyle,
    underline: bool,
    strike: bool,
    size: f32,
}

/// A single-page PDF under construction
///
/// Content is buffered and written to the page when the document is
/// serialized with [`PdfDocument::to_bytes`] or [`PdfDocument::save`].
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// The one page of the document
    page_id: ObjectId,
    page_size: PageSize,
    unit: Unit,
    /// Registered font families, keyed by lowercase name
    font_families: HashMap<String, FontFamily>,
    current_font: Option<FontSelection>,
    current_text_color: Color,
    /// Faces drawn so far (resource name -> face)
    used_fonts: BTreeMap<String, FontFace>,
    /// XObject resources (resource name -> object ID)
    xobjects: BTreeMap<String, ObjectId>,
    /// Embedded images (data hash -> resource name, pixel width, pixel height)
    embedded_images: HashMap<u64, (String, u32, u32)>,
    /// Operators drawing the template, kept underneath all other content
    background: Vec<u8>,
    content: Vec<u8>,
    annotations: Vec<Dictionary>,
}

impl PdfDocument {
    /// Create a blank one-page document
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::new(PageSize::letter().landscape(), Unit::Mm);
    /// ```
    pub fn new(page_size: PageSize, unit: Unit) -> Self {
        let mut inner = Document::with_version("1.7");
        let pages_id = inner.new_object_id();

        let page_id = inner.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(page_size.width as f32),
                Object::Real(page_size.height as f32),
            ],
        });

        inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );

        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        inner.trailer.set("Root", catalog_id);

        Self {
            inner,
            page_id,
            page_size,
            unit,
            font_families: HashMap::new(),
            current_font: None,
            current_text_color: Color::default(),
            used_fonts: BTreeMap::new(),
            xobjects: BTreeMap::new(),
            embedded_images: HashMap::new(),
            background: Vec::new(),
            content: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Use a page of an existing PDF as the page background
    ///
    /// The source page is scaled to cover the whole page. A second call
    /// replaces the previous background.
    ///
    /// # Arguments
    /// * `data` - PDF file bytes
    /// * `page` - Page number in the source (1-indexed)
    pub fn use_template(&mut self, data: &[u8], page: usize) -> Result<()> {
        let form_id = import_page(&mut self.inner, data, page, self.page_size)?;

        let resource_name = format!("Tpl{page}");
        self.xobjects.insert(resource_name.clone(), form_id);
        self.background = format!("q\n/{resource_name} Do\nQ\n").into_bytes();

        Ok(())
    }

    /// Register a TrueType font family under `name`
    ///
    /// # Example
    /// ```ignore
    /// doc.register_font_family(
    ///     "garamond",
    ///     FontFamilyBuilder::new()
    ///         .regular(std::fs::read("EBGaramond-Regular.ttf")?)
    ///         .bold(std::fs::read("EBGaramond-Bold.ttf")?),
    /// )?;
    /// ```
    pub fn register_font_family(&mut self, name: &str, builder: FontFamilyBuilder) -> Result<()> {
        let key = name.to_lowercase();
        if self.font_families.contains_key(&key) {
            return Err(PdfError::FontAlreadyExists(name.to_string()));
        }

        let family = builder.build(&key)?;
        self.font_families.insert(key, family);
        Ok(())
    }

    /// Select the font for subsequent text
    ///
    /// `style` combines the flags `B` (bold), `I` (italic), `U` (underline)
    /// and `D` (strike-through), case-insensitively; other characters are
    /// ignored. Standard families (`helvetica`, `times`, `courier` and their
    /// aliases) are available without registration.
    pub fn set_font(&mut self, family: &str, style: &str, size: f32) -> Result<()> {
        let key = family.trim().to_lowercase();

        if !self.font_families.contains_key(&key) {
            let standard = FontFamily::standard(&key)
                .ok_or_else(|| PdfError::FontNotFound(family.to_string()))?;
            self.font_families.insert(key.clone(), standard);
        }

        let flags = style.to_uppercase();
        self.current_font = Some(FontSelection {
            family: key,
            weight: if flags.contains('B') {
                FontWeight::Bold
            } else {
                FontWeight::Regular
            },
            style: if flags.contains('I') {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            },
            underline: flags.contains('U'),
            strike: flags.contains('D'),
            size,
        });

        Ok(())
    }

    /// Set text color
    pub fn set_text_color(&mut self, color: Color) {
        self.current_text_color = color;
    }

    fn current_face(&self) -> Result<(&FontSelection, &FontFace)> {
        let selection = self
            .current_font
            .as_ref()
            .ok_or_else(|| PdfError::FontNotFound("no font selected".to_string()))?;
        let face = self
            .font_families
            .get(&selection.family)
            .and_then(|family| family.get_variant(selection.weight, selection.style))
            .ok_or_else(|| PdfError::FontNotFound(selection.family.clone()))?;
        Ok((selection, face))
    }

    /// Resource name for a face, registering it on first use
    fn font_resource(&mut self, face: &FontFace, text: &str) -> String {
        let existing = self
            .used_fonts
            .iter_mut()
            .find(|(_, used)| used.name() == face.name());

        if let Some((resource_name, used)) = existing {
            used.add_chars(text);
            return resource_name.clone();
        }

        let resource_name = format!("F{}", self.used_fonts.len() + 1);
        let mut face = face.clone();
        face.add_chars(text);
        self.used_fonts.insert(resource_name.clone(), face);
        resource_name
    }

    /// Draw a wrapped block of text
    ///
    /// Lines are broken to fit the cell width minus padding and stacked
    /// from the top of the cell. Returns the height of the cell in user units.
    pub fn multi_cell(&mut self, cell: &TextCell) -> Result<f64> {
        let (selection, face) = self.current_face()?;
        let selection = selection.clone();
        let face = face.clone();

        let k = self.unit.scale();
        let size = selection.size as f64;
        let line_height = size * LINE_HEIGHT_RATIO;

        let x = cell.x * k;
        let top = self.page_size.height - cell.y * k;
        let width = cell.width * k;
        let available = (width - 2.0 * CELL_PADDING_PT).max(0.0);

        let lines = wrap_text(&cell.text, available, |s| {
            face.text_width_points(s, selection.size) as f64
        });

        let (ascent, descent) = face.vertical_metrics();
        let baseline_offset = (line_height + (ascent as f64 - descent.abs() as f64) * size) / 2.0;

        let anchor = match cell.align {
            Align::Left => x + CELL_PADDING_PT,
            Align::Center => x + width / 2.0,
            Align::Right => x + width - CELL_PADDING_PT,
        };

        let font_resource = self.font_resource(&face, &cell.text);

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }

            let baseline = top - i as f64 * line_height - baseline_offset;
            let ctx = TextRenderContext {
                font_name: font_resource.clone(),
                font_size: selection.size,
                text_width: face.text_width_points(line, selection.size) as f64,
                color: self.current_text_color,
            };

            let ops = generate_text_operators(
                &face.encode_text_hex(line),
                anchor,
                baseline,
                cell.align,
                &ctx,
            );
            self.content.extend_from_slice(&ops);

            let line_start = match cell.align {
                Align::Left => anchor,
                Align::Center => anchor - ctx.text_width / 2.0,
                Align::Right => anchor - ctx.text_width,
            };
            let thickness = size * 0.05;
            if selection.underline {
                self.content.extend(horizontal_line_operators(
                    line_start,
                    baseline - size * 0.1,
                    ctx.text_width,
                    thickness,
                    ctx.color,
                ));
            }
            if selection.strike {
                self.content.extend(horizontal_line_operators(
                    line_start,
                    baseline + size * 0.3,
                    ctx.text_width,
                    thickness,
                    ctx.color,
                ));
            }
        }

        let height = lines.len() as f64 * line_height;
        let bottom = top - height;

        if cell.border {
            self.content
                .extend(rectangle_operators(x, bottom, width, height, BORDER_WIDTH_PT));
        }

        if let Some(url) = &cell.link {
            self.annotations.push(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => vec![
                    Object::Real(x as f32),
                    Object::Real(bottom as f32),
                    Object::Real((x + width) as f32),
                    Object::Real(top as f32),
                ],
                "Border" => vec![0.into(), 0.into(), 0.into()],
                "A" => dictionary! {
                    "S" => "URI",
                    "URI" => Object::string_literal(url.as_str()),
                },
            });
        }

        tracing::trace!(
            lines = lines.len(),
            font = face.name(),
            size = selection.size,
            "placed text cell"
        );

        Ok(height / k)
    }

    /// Place an image with its top-left corner at (`x`, `y`)
    ///
    /// With `height` set to `None` the height follows the image's aspect
    /// ratio. Returns the placed (width, height) in user units.
    ///
    /// # Arguments
    /// * `data` - Image file bytes (JPEG or PNG)
    pub fn insert_image(
        &mut self,
        data: &[u8],
        x: f64,
        y: f64,
        width: f64,
        height: Option<f64>,
    ) -> Result<(f64, f64)> {
        let (resource_name, pixel_width, pixel_height) = self.image_resource(data)?;

        let mode = match height {
            Some(_) => ImageScaleMode::Stretch,
            None => ImageScaleMode::FitWidth,
        };
        let (width, height) = calculate_scaled_dimensions(
            pixel_width,
            pixel_height,
            width,
            height.unwrap_or_default(),
            mode,
        );

        let k = self.unit.scale();
        let pdf_y = self.page_size.height - (y + height) * k;
        let ops = generate_image_operators(&resource_name, x * k, pdf_y, width * k, height * k);
        self.content.extend_from_slice(&ops);

        Ok((width, height))
    }

    /// Embed an image once per distinct byte content
    fn image_resource(&mut self, data: &[u8]) -> Result<(String, u32, u32)> {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        let data_hash = hasher.finish();

        if let Some(existing) = self.embedded_images.get(&data_hash) {
            return Ok(existing.clone());
        }

        let xobject = ImageXObject::from_bytes(data)?;
        let object_id = self.inner.add_object(xobject.to_pdf_stream());

        let resource_name = format!("Im{}", self.embedded_images.len() + 1);
        self.xobjects.insert(resource_name.clone(), object_id);

        let entry = (resource_name, xobject.width, xobject.height);
        self.embedded_images.insert(data_hash, entry.clone());
        Ok(entry)
    }

    /// Add a font's objects and return the font dictionary's ID
    fn embed_font(&mut self, face: &FontFace) -> ObjectId {
        let font_data = match face {
            FontFace::Standard(font) => {
                return self.inner.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => font.base_font(),
                    "Encoding" => "WinAnsiEncoding",
                });
            }
            FontFace::Embedded(font_data) => font_data,
        };

        let font_objects = font_data.to_pdf_objects();

        let font_file_id = self.inner.add_object(font_objects.font_file_stream);

        let mut font_descriptor = font_objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let font_descriptor_id = self.inner.add_object(font_descriptor);

        let mut cid_font = font_objects.cid_font;
        cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
        let cid_font_id = self.inner.add_object(cid_font);

        let tounicode_id = self.inner.add_object(font_objects.tounicode_stream);

        let mut type0_font = font_objects.type0_font;
        type0_font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(cid_font_id)]),
        );
        type0_font.set("ToUnicode", Object::Reference(tounicode_id));

        self.inner.add_object(type0_font)
    }

    /// Write buffered content, fonts and resources into the page
    fn finish(mut self) -> Result<Document> {
        let mut fonts = Dictionary::new();
        for (resource_name, face) in std::mem::take(&mut self.used_fonts) {
            let font_id = self.embed_font(&face);
            fonts.set(resource_name, Object::Reference(font_id));
        }

        let mut xobjects = Dictionary::new();
        for (resource_name, object_id) in &self.xobjects {
            xobjects.set(resource_name.as_str(), Object::Reference(*object_id));
        }

        let mut content = std::mem::take(&mut self.background);
        content.append(&mut self.content);
        let content_id = self.inner.add_object(Stream::new(Dictionary::new(), content));

        let annotations: Vec<Object> = std::mem::take(&mut self.annotations)
            .into_iter()
            .map(|annot| Object::Reference(self.inner.add_object(annot)))
            .collect();

        tracing::debug!(
            fonts = fonts.len(),
            xobjects = xobjects.len(),
            annotations = annotations.len(),
            "finishing page"
        );

        let page = self
            .inner
            .get_object_mut(self.page_id)
            .and_then(Object::as_dict_mut)?;
        page.set("Contents", Object::Reference(content_id));
        let proc_set: Vec<Object> = ["PDF", "Text", "ImageB", "ImageC"]
            .into_iter()
            .map(Object::from)
            .collect();
        page.set(
            "Resources",
            dictionary! {
                "ProcSet" => proc_set,
                "Font" => fonts,
                "XObject" => xobjects,
            },
        );
        if !annotations.is_empty() {
            page.set("Annots", annotations);
        }

        self.inner.prune_objects();
        self.inner.compress();
        Ok(self.inner)
    }

    /// Serialize the document to a file
    pub fn save<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let mut doc = self.finish()?;
        doc.save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Serialize the document to bytes
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut doc = self.finish()?;
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn letter_mm() -> PdfDocument {
        PdfDocument::new(PageSize::letter().landscape(), Unit::Mm)
    }

    fn content_of(doc: &PdfDocument) -> String {
        String::from_utf8_lossy(&doc.content).into_owned()
    }

    #[test]
    fn test_document_creation() {
        let doc = letter_mm();
        assert_eq!(doc.inner.get_pages().len(), 1);
        assert_eq!(doc.page_size().width, 792.0);
        assert_eq!(doc.unit(), Unit::Mm);
    }

    #[test]
    fn test_text_cell_builder() {
        let cell = TextCell::new("Hi", 1.0, 2.0, 3.0)
            .align(Align::Right)
            .border(true)
            .link("https://example.org");
        assert_eq!(cell.align, Align::Right);
        assert!(cell.border);
        assert_eq!(cell.link.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn test_set_font_unknown_family() {
        let mut doc = letter_mm();
        let result = doc.set_font("no-such-font", "", 12.0);
        assert!(matches!(result, Err(PdfError::FontNotFound(_))));
    }

    #[test]
    fn test_multi_cell_without_font() {
        let mut doc = letter_mm();
        let result = doc.multi_cell(&TextCell::new("text", 0.0, 0.0, 50.0));
        assert!(matches!(result, Err(PdfError::FontNotFound(_))));
    }

    #[test]
    fn test_set_font_style_flags() {
        let mut doc = letter_mm();
        doc.set_font("Arial", "bu", 10.0).unwrap();

        let selection = doc.current_font.clone().unwrap();
        assert_eq!(selection.weight, FontWeight::Bold);
        assert_eq!(selection.style, FontStyle::Normal);
        assert!(selection.underline);
        assert!(!selection.strike);

        let (_, face) = doc.current_face().unwrap();
        assert_eq!(face.name(), "Helvetica-Bold");
    }

    #[test]
    fn test_multi_cell_single_line_height() {
        let mut doc = PdfDocument::new(PageSize::letter(), Unit::Pt);
        doc.set_font("helvetica", "", 16.0).unwrap();

        let height = doc
            .multi_cell(&TextCell::new("Hello", 100.0, 100.0, 300.0))
            .unwrap();
        assert_eq!(height, 20.0);

        // Left edge plus padding; baseline 100 + (20 + 16 * 0.6) / 2 from the top
        let content = content_of(&doc);
        assert!(content.contains("/F1 16 Tf"));
        assert!(content.contains("102.835 677.2 Td"), "{content}");
    }

    #[test]
    fn test_multi_cell_wraps_lines() {
        let mut doc = PdfDocument::new(PageSize::letter(), Unit::Pt);
        doc.set_font("courier", "", 10.0).unwrap();

        // Courier is 6pt per char at 10pt; 60pt of usable width fits 10 chars
        let width = 60.0 + 2.0 * CELL_PADDING_PT;
        let height = doc
            .multi_cell(&TextCell::new("aaaa bbbb cccc", 0.0, 0.0, width))
            .unwrap();
        assert_eq!(height, 25.0);
        assert_eq!(content_of(&doc).matches(" Tj").count(), 2);
    }

    #[test]
    fn test_multi_cell_center_anchor() {
        let mut doc = PdfDocument::new(PageSize::letter(), Unit::Pt);
        doc.set_font("courier", "", 10.0).unwrap();
        doc.multi_cell(&TextCell::new("abcd", 100.0, 0.0, 200.0).align(Align::Center))
            .unwrap();

        // Center 200 minus half of 24pt
        assert!(content_of(&doc).contains("188 "));
    }

    #[test]
    fn test_multi_cell_border_and_link() {
        let mut doc = PdfDocument::new(PageSize::letter(), Unit::Pt);
        doc.set_font("times", "", 12.0).unwrap();
        doc.multi_cell(
            &TextCell::new("linked", 10.0, 10.0, 100.0)
                .border(true)
                .link("https://example.org/members/jane/"),
        )
        .unwrap();

        assert!(content_of(&doc).contains("0.567 w"));
        assert_eq!(doc.annotations.len(), 1);
    }

    #[test]
    fn test_underline_and_strike() {
        let mut doc = PdfDocument::new(PageSize::letter(), Unit::Pt);
        doc.set_font("helvetica", "UD", 10.0).unwrap();
        doc.multi_cell(&TextCell::new("lined", 0.0, 0.0, 200.0)).unwrap();

        assert_eq!(content_of(&doc).matches(" l\n").count(), 2);
    }

    #[test]
    fn test_same_face_shares_resource() {
        let mut doc = PdfDocument::new(PageSize::letter(), Unit::Pt);
        doc.set_font("helvetica", "", 10.0).unwrap();
        doc.multi_cell(&TextCell::new("one", 0.0, 0.0, 200.0)).unwrap();
        doc.set_font("arial", "", 14.0).unwrap();
        doc.multi_cell(&TextCell::new("two", 0.0, 50.0, 200.0)).unwrap();
        doc.set_font("helvetica", "B", 14.0).unwrap();
        doc.multi_cell(&TextCell::new("three", 0.0, 90.0, 200.0)).unwrap();

        assert_eq!(doc.used_fonts.len(), 2);
    }

    #[test]
    fn test_to_bytes_produces_pdf() {
        let mut doc = letter_mm();
        doc.set_font("helvetica", "", 12.0).unwrap();
        doc.multi_cell(&TextCell::new("Certificate", 20.0, 20.0, 100.0)).unwrap();

        let bytes = doc.to_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }
}
