//! Badge image loading
//!
//! Image fields name their source as a path, a `file://` URL, a `data:` URL
//! or (with the `remote-images` feature) an http(s) URL.

use crate::{CertificateError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

/// Fetch image bytes for an image field
pub trait ImageLoader {
    fn load(&self, source: &str) -> Result<Vec<u8>>;
}

/// Loads images from the filesystem, inline data URLs and optionally the web
///
/// Relative paths resolve against `base_dir` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsImageLoader {
    pub base_dir: Option<PathBuf>,
}

impl FsImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, source: &str) -> Result<Vec<u8>> {
        let source = source.trim();
        if source.is_empty() {
            return Err(CertificateError::ImageError("empty image source".to_string()));
        }

        if let Some(data_url) = source.strip_prefix("data:") {
            return decode_data_url(data_url);
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            return fetch_remote(source);
        }

        let path = match source.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None => self.resolve_path(source),
        };

        tracing::debug!(path = %path.display(), "loading image");
        std::fs::read(&path)
            .map_err(|e| CertificateError::ImageError(format!("{}: {e}", path.display())))
    }
}

/// Decode the part after `data:`; only base64 payloads are accepted
fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| CertificateError::ImageError("malformed data URL".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(CertificateError::ImageError(
            "data URL is not base64 encoded".to_string(),
        ));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| CertificateError::ImageError(format!("invalid base64 image data: {e}")))
}

#[cfg(feature = "remote-images")]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    tracing::debug!(%url, "fetching remote image");

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| CertificateError::ImageError(format!("{url}: {e}")))?;

    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(|e| CertificateError::ImageError(format!("{url}: {e}")))
}

#[cfg(not(feature = "remote-images"))]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    Err(CertificateError::ImageError(format!(
        "remote images are disabled: {url}"
    )))
}
