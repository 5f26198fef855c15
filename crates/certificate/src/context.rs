//! Recipient, badge and issuer records and their provider

use serde::{Deserialize, Serialize};

/// A site user who can receive badges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: u64,
    pub login: String,
    pub email: String,
    pub display_name: String,
    /// URL-safe name used in profile links
    pub nicename: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Definition of an awarded credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeClass {
    pub id: String,
    pub name: String,
    /// Issuer id
    pub issuer: String,
    /// Badge image location
    pub image: String,
}

/// Organization awarding badge classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub id: String,
    pub name: String,
}

/// Public page presenting one badge class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgePage {
    pub id: u64,
    pub slug: String,
    /// Badge class id
    pub badgeclass: String,
}

/// A badge issuance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionContext {
    /// Badge class id
    pub badgeclass: String,
    /// Recipient email (plaintext identity)
    pub recipient: String,
    /// Issuance timestamp as stored by the badge backend
    pub issued_on: String,
    /// Baked badge image location
    pub image: String,
}

/// Lookups into the badge backend and the site's user directory
pub trait AssertionProvider {
    fn badge_class(&self, id: &str) -> Option<BadgeClass>;

    fn issuer(&self, id: &str) -> Option<Issuer>;

    fn badge_page_by_badgeclass(&self, badgeclass: &str) -> Option<BadgePage>;

    fn badge_page(&self, id: u64) -> Option<BadgePage>;

    fn badge_page_by_slug(&self, slug: &str) -> Option<BadgePage>;

    fn user_by_email(&self, email: &str) -> Option<Recipient>;

    fn user_by_login(&self, login: &str) -> Option<Recipient>;

    /// The assertion of `badgeclass` issued to `recipient`
    fn assertion_for(&self, recipient: &Recipient, badgeclass: &str) -> Option<AssertionContext>;
}

/// Site-wide values used in links and emails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub home_url: String,
    #[serde(default = "default_members_slug")]
    pub members_slug: String,
    pub name: String,
    pub admin_email: String,
}

fn default_members_slug() -> String {
    "members".to_string()
}

/// Public profile URL of a recipient: `{home}/{members_slug}/{nicename}/`
pub fn portfolio_link(site: &SiteConfig, recipient: &Recipient) -> String {
    format!(
        "{}/{}/{}/",
        site.home_url.trim_end_matches('/'),
        site.members_slug.trim_matches('/'),
        recipient.nicename
    )
}

/// Values substituted for tokens in one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionContext {
    /// Raw issuance timestamp, formatted on use
    pub issued_on: String,
    pub issuer_name: String,
    pub recipient_name: String,
    pub portfolio_url: String,
    pub badge_image: String,
}

impl SubstitutionContext {
    pub fn new(
        assertion: &AssertionContext,
        issuer: &Issuer,
        recipient: &Recipient,
        site: &SiteConfig,
    ) -> Self {
        Self {
            issued_on: assertion.issued_on.clone(),
            issuer_name: issuer.name.clone(),
            recipient_name: recipient.display_name.clone(),
            portfolio_url: portfolio_link(site, recipient),
            badge_image: assertion.image.clone(),
        }
    }
}
