//! Certificate URLs: `{slug}/{member}/{badge}/`

/// A request for one member's certificate of one badge page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRoute {
    /// Member login
    pub member: String,
    /// Badge page slug
    pub badge: String,
}

impl CertificateRoute {
    /// Match a request path against `<slug>/<member>/<badge>/?`
    ///
    /// Leading slashes are ignored; the trailing slash is optional. Any
    /// other shape yields `None`.
    pub fn parse(slug: &str, path: &str) -> Option<Self> {
        let path = path.trim_start_matches('/');
        let path = path.strip_suffix('/').unwrap_or(path);

        let mut parts = path.split('/');
        let (Some(first), Some(member), Some(badge), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        if first != slug.trim_matches('/') || member.is_empty() || badge.is_empty() {
            return None;
        }

        Some(Self {
            member: member.to_string(),
            badge: badge.to_string(),
        })
    }
}

/// Public URL of a member's certificate
pub fn certificate_link(home_url: &str, slug: &str, login: &str, badge: &str) -> String {
    format!(
        "{}/{}/{login}/{badge}/",
        home_url.trim_end_matches('/'),
        slug.trim_matches('/')
    )
}
