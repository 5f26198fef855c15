//! Fields after token substitution

use crate::settings::FieldSettings;

/// A field ready to be drawn
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedField {
    /// The badge image, loaded from `source`
    Image {
        settings: FieldSettings,
        source: String,
    },
    /// A text cell, optionally linked
    Text {
        settings: FieldSettings,
        text: String,
        link: Option<String>,
    },
}

impl ResolvedField {
    pub fn settings(&self) -> &FieldSettings {
        match self {
            ResolvedField::Image { settings, .. } | ResolvedField::Text { settings, .. } => settings,
        }
    }
}
