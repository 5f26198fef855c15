//! End-to-end certificate generation

use crate::context::{
    AssertionContext, AssertionProvider, BadgePage, Recipient, SiteConfig, SubstitutionContext,
};
use crate::renderer::CertificateRenderer;
use crate::resolver::{resolve, MediaLibrary, SettingsStore};
use crate::routing::CertificateRoute;
use crate::storage::CertificateStore;
use crate::tokens::substitute;
use crate::{CertificateError, Result};
use std::path::PathBuf;

/// Result of a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateOutput {
    /// PDF bytes for the caller to emit
    Stream(Vec<u8>),
    /// Path of the stored certificate
    Persisted(PathBuf),
}

/// Produces certificates from assertions
///
/// Borrows the host's stores; owns the renderer and the storage location.
pub struct CertificateGenerator<'a> {
    settings: &'a dyn SettingsStore,
    media: &'a dyn MediaLibrary,
    directory: &'a dyn AssertionProvider,
    site: SiteConfig,
    renderer: CertificateRenderer,
    store: CertificateStore,
}

impl<'a> CertificateGenerator<'a> {
    pub fn new(
        settings: &'a dyn SettingsStore,
        media: &'a dyn MediaLibrary,
        directory: &'a dyn AssertionProvider,
        site: SiteConfig,
        renderer: CertificateRenderer,
        store: CertificateStore,
    ) -> Self {
        Self {
            settings,
            media,
            directory,
            site,
            renderer,
            store,
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn directory(&self) -> &dyn AssertionProvider {
        self.directory
    }

    /// Render the certificate of `assertion`
    ///
    /// With `save` unset the PDF bytes are returned. With `save` set the
    /// certificate is written once under the storage root and its path is
    /// returned; an existing file is returned as is, without rendering.
    pub fn generate(&self, assertion: &AssertionContext, save: bool) -> Result<CertificateOutput> {
        let resolved = resolve(self.settings, self.media)?;

        let badge = self
            .directory
            .badge_class(&assertion.badgeclass)
            .ok_or_else(|| CertificateError::BadgeClassNotFound(assertion.badgeclass.clone()))?;
        let issuer = self
            .directory
            .issuer(&badge.issuer)
            .ok_or_else(|| CertificateError::IssuerNotFound(badge.issuer.clone()))?;
        let recipient = self
            .directory
            .user_by_email(&assertion.recipient)
            .ok_or_else(|| CertificateError::RecipientNotFound(assertion.recipient.clone()))?;

        let target = if save {
            let badge_page = self
                .directory
                .badge_page_by_badgeclass(&badge.id)
                .ok_or_else(|| CertificateError::BadgePageNotFound(badge.id.clone()))?;
            let path = self.store.path_for(&recipient, &badge_page);
            if path.exists() {
                tracing::info!(path = %path.display(), "certificate already stored");
                return Ok(CertificateOutput::Persisted(path));
            }
            Some(path)
        } else {
            None
        };

        let context = SubstitutionContext::new(assertion, &issuer, &recipient, &self.site);
        let fields = resolved
            .settings
            .fields
            .iter()
            .map(|(_, field)| substitute(field, &context))
            .collect::<Result<Vec<_>>>()?;

        let bytes = self.renderer.render(&resolved.template_path, &fields)?;

        match target {
            Some(path) => {
                self.store.persist(&path, &bytes)?;
                Ok(CertificateOutput::Persisted(path))
            }
            None => {
                tracing::info!(
                    recipient = %recipient.login,
                    badge = %badge.id,
                    bytes = bytes.len(),
                    "rendered certificate"
                );
                Ok(CertificateOutput::Stream(bytes))
            }
        }
    }

    /// Generate the certificate addressed by a certificate URL
    pub fn generate_for_route(&self, route: &CertificateRoute, save: bool) -> Result<CertificateOutput> {
        let recipient = self
            .directory
            .user_by_login(&route.member)
            .ok_or_else(|| CertificateError::RecipientNotFound(route.member.clone()))?;
        let page = self
            .directory
            .badge_page_by_slug(&route.badge)
            .ok_or_else(|| CertificateError::BadgePageNotFound(route.badge.clone()))?;

        let assertion = find_assertion(self.directory, &recipient, &page)?;
        self.generate(&assertion, save)
    }
}

/// The assertion of a badge page's badge class held by `recipient`
pub(crate) fn find_assertion(
    directory: &dyn AssertionProvider,
    recipient: &Recipient,
    page: &BadgePage,
) -> Result<AssertionContext> {
    directory
        .assertion_for(recipient, &page.badgeclass)
        .ok_or_else(|| CertificateError::AssertionNotFound {
            recipient: recipient.login.clone(),
            badge: page.badgeclass.clone(),
        })
}
