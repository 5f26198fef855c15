//! JSON configuration file

use anyhow::{Context, Result};
use certificate::{FontFiles, MediaId, SiteConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn default_nonce() -> String {
    "certgen".to_string()
}

/// Everything `certgen` needs to produce and send certificates
///
/// Relative paths are resolved against the directory of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// JSON object of stored options, keyed by option name
    pub settings: PathBuf,

    /// Media library: attachment id -> file
    #[serde(default)]
    pub media: BTreeMap<MediaId, PathBuf>,

    /// Where persisted certificates are written
    pub storage_root: PathBuf,

    pub site: SiteConfig,

    /// JSON file of users, badge classes, issuers, badge pages and assertions
    pub directory: PathBuf,

    /// TrueType families by name
    #[serde(default)]
    pub fonts: BTreeMap<String, FontFiles>,

    /// Directory receiving sent mail as JSON files
    #[serde(default)]
    pub outbox: Option<PathBuf>,

    /// Nonce accepted by `send`
    #[serde(default = "default_nonce")]
    pub nonce: String,

    /// Base directory for relative badge image paths (config dir if unset)
    #[serde(default)]
    pub images_dir: Option<PathBuf>,
}

fn rebase(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Config {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.rebase(base);

        tracing::debug!(
            config = %path.display(),
            media = config.media.len(),
            fonts = config.fonts.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        rebase(base, &mut self.settings);
        rebase(base, &mut self.storage_root);
        rebase(base, &mut self.directory);
        for path in self.media.values_mut() {
            rebase(base, path);
        }
        for files in self.fonts.values_mut() {
            for path in [
                &mut files.regular,
                &mut files.bold,
                &mut files.italic,
                &mut files.bold_italic,
            ]
            .into_iter()
            .flatten()
            {
                rebase(base, path);
            }
        }
        if let Some(outbox) = &mut self.outbox {
            rebase(base, outbox);
        }
        match &mut self.images_dir {
            Some(dir) => rebase(base, dir),
            None => self.images_dir = Some(base.to_path_buf()),
        }
    }

    /// The stored options
    pub fn load_settings(&self) -> Result<serde_json::Value> {
        let contents = std::fs::read_to_string(&self.settings)
            .with_context(|| format!("failed to read settings {}", self.settings.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings {}", self.settings.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relative_paths_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certgen.json");
        std::fs::write(
            &path,
            r#"{
                "settings": "options.json",
                "media": { "5": "media/template.pdf", "6": "/abs/other.pdf" },
                "storage_root": "attachments",
                "site": {
                    "home_url": "https://example.org",
                    "name": "Badges",
                    "admin_email": "admin@example.org"
                },
                "directory": "directory.json",
                "fonts": { "garamond": { "regular": "fonts/Garamond.ttf" } }
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.settings, dir.path().join("options.json"));
        assert_eq!(config.media[&5], dir.path().join("media/template.pdf"));
        assert_eq!(config.media[&6], PathBuf::from("/abs/other.pdf"));
        assert_eq!(config.storage_root, dir.path().join("attachments"));
        assert_eq!(
            config.fonts["garamond"].regular,
            Some(dir.path().join("fonts/Garamond.ttf"))
        );
        assert_eq!(config.site.members_slug, "members");
        assert_eq!(config.nonce, "certgen");
        assert_eq!(config.outbox, None);
        assert_eq!(config.images_dir, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_missing_config() {
        let err = Config::load(Path::new("/nonexistent/certgen.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
