//! Settings resolution against the host's option store and media library

use crate::settings::{CertificateSettings, MediaId, DEFAULT_SLUG, SETTINGS_OPTION, SLUG_KEY};
use crate::{CertificateError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Named option storage
pub trait SettingsStore {
    /// Stored value of an option, if set
    fn option(&self, name: &str) -> Option<Value>;
}

/// Media attachments by id
pub trait MediaLibrary {
    /// Path of the file attached to `media_id`
    fn attached_file(&self, media_id: MediaId) -> Option<PathBuf>;
}

/// A JSON object whose top-level keys are option names
impl SettingsStore for Value {
    fn option(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl SettingsStore for HashMap<String, Value> {
    fn option(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl MediaLibrary for BTreeMap<MediaId, PathBuf> {
    fn attached_file(&self, media_id: MediaId) -> Option<PathBuf> {
        self.get(&media_id).cloned()
    }
}

impl MediaLibrary for HashMap<MediaId, PathBuf> {
    fn attached_file(&self, media_id: MediaId) -> Option<PathBuf> {
        self.get(&media_id).cloned()
    }
}

/// Settings ready for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    /// Existing template PDF on disk
    pub template_path: PathBuf,
    pub settings: CertificateSettings,
}

/// Load the certificate settings and locate the template file
///
/// Fails with `ConfigurationMissing` when the settings option is absent, has
/// no template id, or the template's attached file does not exist.
pub fn resolve(store: &dyn SettingsStore, media: &dyn MediaLibrary) -> Result<ResolvedSettings> {
    let Some(option) = store.option(SETTINGS_OPTION) else {
        tracing::warn!(option = SETTINGS_OPTION, "settings option is not set");
        return Err(CertificateError::ConfigurationMissing);
    };

    let settings = CertificateSettings::from_value(&option)?;

    let template_path = media
        .attached_file(settings.template.media_id)
        .filter(|path| path.is_file())
        .ok_or_else(|| {
            tracing::warn!(
                media_id = settings.template.media_id,
                "template attachment is missing"
            );
            CertificateError::ConfigurationMissing
        })?;

    tracing::debug!(
        template = %template_path.display(),
        fields = settings.fields.len(),
        "resolved certificate settings"
    );

    Ok(ResolvedSettings {
        template_path,
        settings,
    })
}

/// URL slug for certificate links, `certificate` unless configured
pub fn certificate_slug(store: &dyn SettingsStore) -> String {
    store
        .option(SETTINGS_OPTION)
        .as_ref()
        .and_then(|settings| settings.get(SLUG_KEY))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .unwrap_or(DEFAULT_SLUG)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store_with(settings: Value) -> Value {
        json!({ SETTINGS_OPTION: settings })
    }

    #[test]
    fn test_resolve_existing_template() {
        let template = tempfile::NamedTempFile::new().unwrap();
        let media = BTreeMap::from([(5u64, template.path().to_path_buf())]);
        let store = store_with(json!({
            "bf2_certificate_template_id": 5,
            "name": { "text": "$name$", "pos_x": 10, "pos_y": 10, "width": 100 }
        }));

        let resolved = resolve(&store, &media).unwrap();
        assert_eq!(resolved.template_path, template.path());
        assert_eq!(resolved.settings.fields.len(), 1);
    }

    #[test]
    fn test_resolve_without_option() {
        let media: BTreeMap<MediaId, PathBuf> = BTreeMap::new();
        let result = resolve(&json!({}), &media);
        assert!(matches!(result, Err(CertificateError::ConfigurationMissing)));
    }

    #[test]
    fn test_resolve_unattached_template() {
        let media: BTreeMap<MediaId, PathBuf> = BTreeMap::new();
        let store = store_with(json!({ "bf2_certificate_template_id": 5 }));
        let result = resolve(&store, &media);
        assert!(matches!(result, Err(CertificateError::ConfigurationMissing)));
    }

    #[test]
    fn test_resolve_attachment_file_gone() {
        let media = BTreeMap::from([(5u64, PathBuf::from("/nonexistent/template.pdf"))]);
        let store = store_with(json!({ "bf2_certificate_template_id": 5 }));
        let result = resolve(&store, &media);
        assert!(matches!(result, Err(CertificateError::ConfigurationMissing)));
    }

    #[test]
    fn test_certificate_slug() {
        assert_eq!(certificate_slug(&json!({})), "certificate");
        assert_eq!(
            certificate_slug(&store_with(json!({ "bf2_certificate_slug": "" }))),
            "certificate"
        );
        assert_eq!(
            certificate_slug(&store_with(json!({ "bf2_certificate_slug": "diplome" }))),
            "diplome"
        );
    }
}
