//! File-backed mail transport and nonce check for `certgen send`

use certificate::email::SEND_NONCE_ACTION;
use certificate::{CertificateError, Mailer, NonceVerifier, OutgoingMail};
use std::path::PathBuf;

/// Writes each message as a JSON file in a directory
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, mail: &OutgoingMail) -> certificate::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let recipient: String = mail
            .to
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let path = self.dir.join(format!("{stamp}-{recipient}.json"));

        let json = serde_json::to_vec_pretty(mail)?;
        std::fs::write(&path, json).map_err(|e| {
            CertificateError::EmailDeliverySystemError(format!("{}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), to = %mail.to, "mail written to outbox");
        Ok(())
    }
}

/// Accepts one configured nonce for the send action
#[derive(Debug, Clone)]
pub struct ConfiguredNonce(pub String);

impl NonceVerifier for ConfiguredNonce {
    fn verify(&self, nonce: &str, action: &str) -> bool {
        action == SEND_NONCE_ACTION && !nonce.is_empty() && nonce == self.0
    }
}
