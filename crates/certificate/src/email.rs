//! Sending a stored certificate by email

use crate::context::{Recipient, SiteConfig};
use crate::generator::{find_assertion, CertificateGenerator, CertificateOutput};
use crate::{CertificateError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Action name the request nonce is bound to
pub const SEND_NONCE_ACTION: &str = "send_basic_certificate_email";

/// Body of a send request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendCertificateRequest {
    /// Badge page id
    pub badge_page: u64,
    pub nonce: String,
    pub to_email: String,
}

/// Per-slot error messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// JSON reply to a send request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendCertificateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<SendErrors>,
}

impl SendCertificateResponse {
    fn sent() -> Self {
        Self {
            success: true,
            errors: None,
        }
    }

    fn failed(err: &CertificateError) -> Self {
        let message = Some(err.to_string());
        let errors = match err {
            CertificateError::EmailAddressInvalid(_) => SendErrors {
                email: message,
                system: None,
            },
            _ => SendErrors {
                email: None,
                system: message,
            },
        };
        Self {
            success: false,
            errors: Some(errors),
        }
    }
}

/// Checks request nonces
pub trait NonceVerifier {
    fn verify(&self, nonce: &str, action: &str) -> bool;
}

/// A display name and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

/// A message with file attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub from: Mailbox,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Mail transport
pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Sender of mail sent on behalf of `current_user`
///
/// The name is "first last", else the user's nicename, else the site name.
/// The address is the user's, else the site admin's.
pub fn sender(current_user: Option<&Recipient>, site: &SiteConfig) -> Mailbox {
    let Some(user) = current_user else {
        return Mailbox {
            name: site.name.clone(),
            email: site.admin_email.clone(),
        };
    };

    let full_name = format!("{} {}", user.first_name, user.last_name);
    let name = [full_name.trim(), user.nicename.trim()]
        .into_iter()
        .find(|name| !name.is_empty())
        .unwrap_or(site.name.as_str())
        .to_string();

    let email = if user.email.trim().is_empty() {
        site.admin_email.clone()
    } else {
        user.email.clone()
    };

    Mailbox { name, email }
}

/// Loose address check: one `@`, a non-empty local part and a dotted domain
pub fn is_valid_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Handles "email me my certificate" requests
pub struct EmailEndpoint<'a> {
    generator: &'a CertificateGenerator<'a>,
    nonces: &'a dyn NonceVerifier,
    mailer: &'a dyn Mailer,
}

impl<'a> EmailEndpoint<'a> {
    pub fn new(
        generator: &'a CertificateGenerator<'a>,
        nonces: &'a dyn NonceVerifier,
        mailer: &'a dyn Mailer,
    ) -> Self {
        Self {
            generator,
            nonces,
            mailer,
        }
    }

    /// Email the current user's certificate for the requested badge page
    pub fn handle(
        &self,
        request: &SendCertificateRequest,
        current_user: Option<&Recipient>,
    ) -> SendCertificateResponse {
        match self.send(request, current_user) {
            Ok(()) => SendCertificateResponse::sent(),
            Err(err) => {
                tracing::warn!(badge_page = request.badge_page, error = %err, "certificate email not sent");
                SendCertificateResponse::failed(&err)
            }
        }
    }

    fn send(&self, request: &SendCertificateRequest, current_user: Option<&Recipient>) -> Result<()> {
        if !self.nonces.verify(&request.nonce, SEND_NONCE_ACTION) {
            return Err(CertificateError::EmailDeliverySystemError(
                "invalid or expired request".to_string(),
            ));
        }

        let to = request.to_email.trim();
        if !is_valid_email(to) {
            return Err(CertificateError::EmailAddressInvalid(to.to_string()));
        }

        let user = current_user.ok_or_else(|| {
            CertificateError::EmailDeliverySystemError("you must be logged in".to_string())
        })?;

        let directory = self.generator.directory();
        let page = directory
            .badge_page(request.badge_page)
            .ok_or_else(|| CertificateError::BadgePageNotFound(request.badge_page.to_string()))?;
        let assertion = find_assertion(directory, user, &page)?;
        let badge_name = directory
            .badge_class(&page.badgeclass)
            .map(|badge| badge.name)
            .unwrap_or_else(|| page.slug.clone());

        let path = match self.generator.generate(&assertion, true)? {
            CertificateOutput::Persisted(path) => path,
            CertificateOutput::Stream(_) => {
                return Err(CertificateError::EmailDeliverySystemError(
                    "certificate was not stored".to_string(),
                ))
            }
        };

        let from = sender(Some(user), self.generator.site());
        let mail = OutgoingMail {
            subject: format!("Certificate: {badge_name}"),
            body: format!(
                "{} sent you the certificate for the badge \"{badge_name}\".\n",
                from.name
            ),
            from,
            to: to.to_string(),
            attachments: vec![path],
        };

        self.mailer
            .send(&mail)
            .map_err(|e| CertificateError::EmailDeliverySystemError(e.to_string()))?;

        tracing::info!(to = %mail.to, badge = %badge_name, "certificate emailed");
        Ok(())
    }
}
