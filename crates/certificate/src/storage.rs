//! Write-once certificate storage

use crate::context::{BadgePage, Recipient};
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keep ASCII alphanumerics, `-` and `_`
fn sanitize(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// File name of a recipient's certificate for one badge page
///
/// The numeric user and page ids make names unique per pair even when the
/// sanitized login or slug collide.
pub fn certificate_filename(recipient: &Recipient, badge_page: &BadgePage) -> String {
    format!(
        "{}-{}-{}-{}.pdf",
        sanitize(&badge_page.slug),
        sanitize(&recipient.login),
        recipient.id,
        badge_page.id
    )
}

/// Directory holding persisted certificates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStore {
    root: PathBuf,
}

impl CertificateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn path_for(&self, recipient: &Recipient, badge_page: &BadgePage) -> PathBuf {
        self.root.join(certificate_filename(recipient, badge_page))
    }

    /// Write `bytes` to `path` unless a file is already there
    ///
    /// The bytes go to a temporary file in the same directory first, so the
    /// target is never observed half written. Returns `false` when another
    /// writer got there first.
    pub fn persist(&self, path: &Path, bytes: &[u8]) -> Result<bool> {
        self.ensure_root()?;
        let dir = path.parent().unwrap_or(&self.root);

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(path) {
            Ok(_) => {
                tracing::info!(path = %path.display(), bytes = bytes.len(), "stored certificate");
                Ok(true)
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "certificate already stored");
                Ok(false)
            }
            Err(e) => Err(e.error.into()),
        }
    }
}
