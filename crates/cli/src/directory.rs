//! Users, badges and assertions read from a JSON file

use anyhow::{Context, Result};
use certificate::{AssertionContext, AssertionProvider, BadgeClass, BadgePage, Issuer, Recipient};
use serde::Deserialize;
use std::path::Path;

/// A directory snapshot
///
/// ```json
/// {
///   "users": [{ "id": 12, "login": "jane", "email": "jane@example.org",
///               "display_name": "Jane Doe", "nicename": "jane-doe" }],
///   "badge_classes": [{ "id": "bc1", "name": "First Aid", "issuer": "iss1", "image": "badge.png" }],
///   "issuers": [{ "id": "iss1", "name": "Acme Academy" }],
///   "badge_pages": [{ "id": 40, "slug": "first-aid", "badgeclass": "bc1" }],
///   "assertions": [{ "badgeclass": "bc1", "recipient": "jane@example.org",
///                    "issued_on": "2021-03-05T00:00:00Z", "image": "badge.png" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonDirectory {
    #[serde(default)]
    pub users: Vec<Recipient>,
    #[serde(default)]
    pub badge_classes: Vec<BadgeClass>,
    #[serde(default)]
    pub issuers: Vec<Issuer>,
    #[serde(default)]
    pub badge_pages: Vec<BadgePage>,
    #[serde(default)]
    pub assertions: Vec<AssertionContext>,
}

impl JsonDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read directory {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid directory {}", path.display()))
    }
}

impl AssertionProvider for JsonDirectory {
    fn badge_class(&self, id: &str) -> Option<BadgeClass> {
        self.badge_classes.iter().find(|b| b.id == id).cloned()
    }

    fn issuer(&self, id: &str) -> Option<Issuer> {
        self.issuers.iter().find(|i| i.id == id).cloned()
    }

    fn badge_page_by_badgeclass(&self, badgeclass: &str) -> Option<BadgePage> {
        self.badge_pages
            .iter()
            .find(|p| p.badgeclass == badgeclass)
            .cloned()
    }

    fn badge_page(&self, id: u64) -> Option<BadgePage> {
        self.badge_pages.iter().find(|p| p.id == id).cloned()
    }

    fn badge_page_by_slug(&self, slug: &str) -> Option<BadgePage> {
        self.badge_pages.iter().find(|p| p.slug == slug).cloned()
    }

    fn user_by_email(&self, email: &str) -> Option<Recipient> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn user_by_login(&self, login: &str) -> Option<Recipient> {
        self.users.iter().find(|u| u.login == login).cloned()
    }

    /// Most recent assertion when a badge was issued more than once
    fn assertion_for(&self, recipient: &Recipient, badgeclass: &str) -> Option<AssertionContext> {
        self.assertions
            .iter()
            .rev()
            .find(|a| a.badgeclass == badgeclass && a.recipient.eq_ignore_ascii_case(&recipient.email))
            .cloned()
    }
}
