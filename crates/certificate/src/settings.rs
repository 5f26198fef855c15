//! Certificate settings types

use crate::{CertificateError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Option holding the certificate settings
pub const SETTINGS_OPTION: &str = "bf2_basic_certificates_settings";
/// Settings key holding the template's media id
pub const TEMPLATE_ID_KEY: &str = "bf2_certificate_template_id";
/// Keys containing this marker describe the template, never a field
pub const TEMPLATE_KEY_MARKER: &str = "bf2_certificate_template";
/// Settings key holding the certificate URL slug
pub const SLUG_KEY: &str = "bf2_certificate_slug";
/// Slug used when none is configured
pub const DEFAULT_SLUG: &str = "certificate";

/// Media library attachment id
pub type MediaId = u64;

/// Horizontal alignment of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Parse a stored alignment (`L`/`C`/`R` or `left`/`center`/`right`)
    ///
    /// Anything else is treated as left.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "c" | "center" | "centre" => Align::Center,
            "r" | "right" => Align::Right,
            _ => Align::Left,
        }
    }
}

impl<'de> Deserialize<'de> for Align {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(Align::from_setting).unwrap_or_default())
    }
}

impl From<Align> for pdf_core::Align {
    fn from(align: Align) -> Self {
        match align {
            Align::Left => pdf_core::Align::Left,
            Align::Center => pdf_core::Align::Center,
            Align::Right => pdf_core::Align::Right,
        }
    }
}

/// Accept a JSON number or a numeric string
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Number(f64),
        Text(String),
    }

    match Numeric::deserialize(deserializer)? {
        Numeric::Number(n) => Ok(n),
        Numeric::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, found {s:?}"))),
    }
}

/// Blank strings and nulls become `None`
fn blank_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn default_font() -> String {
    "helvetica".to_string()
}

fn default_size() -> f64 {
    12.0
}

/// Placement and style of one certificate field
///
/// Positions and width are in millimetres from the top-left corner of the
/// page; `size` is in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Literal text, possibly containing tokens
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub align: Align,

    #[serde(deserialize_with = "number_or_string")]
    pub pos_x: f64,

    #[serde(deserialize_with = "number_or_string")]
    pub pos_y: f64,

    #[serde(deserialize_with = "number_or_string")]
    pub width: f64,

    #[serde(default = "default_font")]
    pub font: String,

    /// Style flags: `B`, `I`, `U`, `D`
    #[serde(default)]
    pub style: String,

    #[serde(default = "default_size", deserialize_with = "number_or_string")]
    pub size: f64,

    /// Hex color (`rgb` or `rrggbb`, optional `#`)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub color: Option<String>,
}

impl FieldSettings {
    fn validate(&self, id: &str) -> Result<()> {
        let invalid = |reason: &str| CertificateError::InvalidField {
            field: id.to_string(),
            reason: reason.to_string(),
        };

        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(invalid("width must be greater than zero"));
        }
        if !(self.pos_x.is_finite() && self.pos_y.is_finite()) {
            return Err(invalid("position must be finite"));
        }
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(invalid("font size must be greater than zero"));
        }
        Ok(())
    }
}

/// The template entry of the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateReference {
    pub media_id: MediaId,
}

/// Parsed certificate settings: the template reference and the fields
/// in their configured order
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateSettings {
    pub template: TemplateReference,
    pub fields: Vec<(String, FieldSettings)>,
}

fn media_id(value: &Value) -> Option<MediaId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl CertificateSettings {
    /// Parse the stored settings option
    ///
    /// Fails with `ConfigurationMissing` when the option is not a map or has
    /// no usable template id.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or(CertificateError::ConfigurationMissing)?;

        let template = map
            .get(TEMPLATE_ID_KEY)
            .and_then(media_id)
            .map(|media_id| TemplateReference { media_id })
            .ok_or(CertificateError::ConfigurationMissing)?;

        let mut fields = Vec::new();
        for (id, entry) in map {
            if id.contains(TEMPLATE_KEY_MARKER) {
                continue;
            }
            if !entry.is_object() {
                tracing::debug!(key = %id, "skipping non-field setting");
                continue;
            }

            let field: FieldSettings =
                serde_json::from_value(entry.clone()).map_err(|e| CertificateError::InvalidField {
                    field: id.clone(),
                    reason: e.to_string(),
                })?;
            field.validate(id)?;
            fields.push((id.clone(), field));
        }

        Ok(Self { template, fields })
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(&serde_json::from_str(json)?)
    }
}
