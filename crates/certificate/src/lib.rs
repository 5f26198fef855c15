//! Badge certificates - settings, token substitution and rendering
//!
//! This crate provides:
//! - Certificate settings parsing and resolution against a settings store
//! - Token substitution (`$name$`, `$date$`, `$issuer$`, `$portfolio$`, `$badge$`)
//! - Rendering resolved fields over a PDF template
//! - Write-once certificate storage, URL routing and the email endpoint
//!
//! # Example
//!
//! ```ignore
//! use certificate::{CertificateGenerator, CertificateOutput};
//!
//! let generator = CertificateGenerator::new(&store, &media, &directory, site, renderer, storage);
//! match generator.generate(&assertion, false)? {
//!     CertificateOutput::Stream(bytes) => std::io::stdout().write_all(&bytes)?,
//!     CertificateOutput::Persisted(path) => println!("{}", path.display()),
//! }
//! ```

mod context;
pub mod email;
mod fields;
mod generator;
pub mod images;
mod renderer;
mod resolver;
mod routing;
mod settings;
mod storage;
pub mod tokens;

pub use context::{
    portfolio_link, AssertionContext, AssertionProvider, BadgeClass, BadgePage, Issuer,
    Recipient, SiteConfig, SubstitutionContext,
};
pub use email::{
    EmailEndpoint, Mailbox, Mailer, NonceVerifier, OutgoingMail, SendCertificateRequest,
    SendCertificateResponse, SendErrors,
};
pub use fields::ResolvedField;
pub use generator::{CertificateGenerator, CertificateOutput};
pub use images::{FsImageLoader, ImageLoader};
pub use renderer::{CertificateRenderer, FontFiles};
pub use resolver::{certificate_slug, resolve, MediaLibrary, ResolvedSettings, SettingsStore};
pub use routing::{certificate_link, CertificateRoute};
pub use settings::{
    Align, CertificateSettings, FieldSettings, MediaId, TemplateReference, DEFAULT_SLUG,
    SETTINGS_OPTION, SLUG_KEY, TEMPLATE_ID_KEY,
};
pub use storage::{certificate_filename, CertificateStore};
pub use tokens::substitute;

use thiserror::Error;

/// Errors that can occur while producing or sending a certificate
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Certificate settings missing!")]
    ConfigurationMissing,

    #[error("No user with email {0}")]
    RecipientNotFound(String),

    #[error("Badge class not found: {0}")]
    BadgeClassNotFound(String),

    #[error("Issuer not found: {0}")]
    IssuerNotFound(String),

    #[error("Badge page not found: {0}")]
    BadgePageNotFound(String),

    #[error("No assertion of badge {badge} for {recipient}")]
    AssertionNotFound { recipient: String, badge: String },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid issuance date: {0}")]
    InvalidDate(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Please enter a valid email address.")]
    EmailAddressInvalid(String),

    #[error("The email could not be sent: {0}")]
    EmailDeliverySystemError(String),

    #[error("PDF error: {0}")]
    Pdf(pdf_core::PdfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<pdf_core::PdfError> for CertificateError {
    fn from(err: pdf_core::PdfError) -> Self {
        match err {
            pdf_core::PdfError::InvalidColor(color) => CertificateError::InvalidColor(color),
            pdf_core::PdfError::ImageError(message) => CertificateError::ImageError(message),
            other => CertificateError::Pdf(other),
        }
    }
}

/// Result type for certificate operations
pub type Result<T> = std::result::Result<T, CertificateError>;
