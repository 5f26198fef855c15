//! Image handling for PDF documents

use crate::text::fmt_num;
use crate::{PdfError, Result};
use image::{DynamicImage, ImageDecoder, ImageReader};
use lopdf::{Dictionary, Object, Stream};
use std::io::{Cursor, Write};

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::ImageError(err.to_string())
    }
}

/// Detected image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Image scaling mode for insert_image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageScaleMode {
    /// Stretch to exact dimensions
    #[default]
    Stretch,
    /// Scale proportionally based on width, auto-calculate height
    FitWidth,
}

/// Calculate display dimensions based on scaling mode
///
/// # Returns
/// (actual_width, actual_height) in the same unit as the targets
pub fn calculate_scaled_dimensions(
    original_width: u32,
    original_height: u32,
    target_width: f64,
    target_height: f64,
    mode: ImageScaleMode,
) -> (f64, f64) {
    match mode {
        ImageScaleMode::Stretch => (target_width, target_height),
        ImageScaleMode::FitWidth if original_width == 0 => (target_width, 0.0),
        ImageScaleMode::FitWidth => {
            let aspect = original_height as f64 / original_width as f64;
            (target_width, target_width * aspect)
        }
    }
}

/// Detect image format from magic bytes
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 8 {
        return Err(PdfError::ImageError("Image data too short".to_string()));
    }

    if data[0..3] == [0xFF, 0xD8, 0xFF] {
        return Ok(ImageFormat::Jpeg);
    }

    if data[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Ok(ImageFormat::Png);
    }

    Err(PdfError::ImageError("Unknown image format".to_string()))
}

/// JPEG frame header fields
#[derive(Debug, Clone, Copy)]
struct JpegInfo {
    width: u32,
    height: u32,
    num_components: u8,
}

/// Read the frame header of a JPEG without decoding the scan data
fn get_jpeg_info(data: &[u8]) -> Result<JpegInfo> {
    // SOF segment: marker (2) length (2) precision (1) height (2) width (2) components (1)
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];

        // SOF0..SOF15 except DHT, JPG and DAC
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Ok(JpegInfo {
                width,
                height,
                num_components: data[i + 9],
            });
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        i += 2 + length;
    }

    Err(PdfError::ImageError("Could not parse JPEG info".to_string()))
}

/// Image XObject for PDF embedding
#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Color space ("DeviceRGB", "DeviceGray", "DeviceCMYK")
    pub color_space: &'static str,
    pub bits_per_component: u8,
    /// PDF filter ("DCTDecode" for JPEG, "FlateDecode" for PNG)
    pub filter: &'static str,
    /// Encoded image data
    pub data: Vec<u8>,
}

impl ImageXObject {
    /// Build an XObject from JPEG or PNG bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match detect_format(data)? {
            ImageFormat::Jpeg => Self::from_jpeg(data),
            ImageFormat::Png => Self::from_png(data),
        }
    }

    /// Create XObject from JPEG data
    ///
    /// JPEG images are embedded as-is with the DCTDecode filter.
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let info = get_jpeg_info(data)?;

        let color_space = match info.num_components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            color_space,
            bits_per_component: 8,
            filter: "DCTDecode",
            data: data.to_vec(),
        })
    }

    /// Create XObject from PNG data
    ///
    /// Pixels are decoded and deflated again. Alpha is blended onto white.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let decoder = reader.into_decoder()?;

        let (width, height) = decoder.dimensions();
        let color_type = decoder.color_type();
        let image = DynamicImage::from_decoder(decoder)?;

        let blend = |channel: u8, alpha: u8| {
            let alpha = alpha as f32 / 255.0;
            (channel as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8
        };

        let (raw_data, color_space) = match color_type {
            image::ColorType::L8 | image::ColorType::L16 => {
                (image.to_luma8().into_raw(), "DeviceGray")
            }
            image::ColorType::La8 | image::ColorType::La16 => {
                let gray = image
                    .to_luma_alpha8()
                    .pixels()
                    .map(|p| blend(p[0], p[1]))
                    .collect();
                (gray, "DeviceGray")
            }
            image::ColorType::Rgba8 | image::ColorType::Rgba16 | image::ColorType::Rgba32F => {
                let rgb = image
                    .to_rgba8()
                    .pixels()
                    .flat_map(|p| [blend(p[0], p[3]), blend(p[1], p[3]), blend(p[2], p[3])])
                    .collect();
                (rgb, "DeviceRGB")
            }
            _ => (image.to_rgb8().into_raw(), "DeviceRGB"),
        };

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw_data)?;
        let data = encoder.finish()?;

        Ok(Self {
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: "FlateDecode",
            data,
        })
    }

    /// Convert to lopdf Stream object
    pub fn to_pdf_stream(&self) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", self.width as i64);
        dict.set("Height", self.height as i64);
        dict.set("ColorSpace", Object::Name(self.color_space.as_bytes().to_vec()));
        dict.set("BitsPerComponent", self.bits_per_component as i64);
        dict.set("Filter", Object::Name(self.filter.as_bytes().to_vec()));
        if self.color_space == "DeviceCMYK" {
            // Adobe-style CMYK JPEGs are stored inverted
            let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
                .into_iter()
                .map(Object::Integer)
                .collect();
            dict.set("Decode", decode);
        }
        dict.set("Length", self.data.len() as i64);

        // Already encoded; lopdf must not compress it again
        Stream::new(dict, self.data.clone()).with_compression(false)
    }
}

/// Generate operators to draw an image XObject
///
/// `x`/`y` is the lower-left corner in PDF points.
pub fn generate_image_operators(image_name: &str, x: f64, y: f64, width: f64, height: f64) -> Vec<u8> {
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{image_name} Do\nQ\n",
        fmt_num(width),
        fmt_num(height),
        fmt_num(x),
        fmt_num(y)
    )
    .into_bytes()
}
