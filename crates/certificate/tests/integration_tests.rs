//! Integration tests for certificate generation
//!
//! Each test builds a template PDF, a badge image and an in-memory
//! directory in a temporary folder, then drives the public API.

use certificate::{
    certificate_link, AssertionContext, AssertionProvider, BadgeClass, BadgePage,
    CertificateError, CertificateGenerator, CertificateOutput, CertificateRenderer,
    CertificateRoute, CertificateStore, EmailEndpoint, Issuer, Mailer, MediaId, NonceVerifier,
    OutgoingMail, Recipient, SendCertificateRequest, SiteConfig, SETTINGS_OPTION,
};
use lopdf::{dictionary, Document, Object};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A one-page A4 template drawing a rectangle
fn create_test_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let contents_id = doc.add_object(lopdf::Stream::new(
        dictionary! {},
        b"0.9 0.9 0.8 rg 20 20 555 800 re f".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.28.into(), 841.89.into()],
        "Resources" => dictionary! {},
        "Contents" => contents_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A 60x30 RGB PNG
fn create_badge_png() -> Vec<u8> {
    use image::{ImageBuffer, Rgb};

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(60, 30, |x, _| Rgb([x as u8 * 4, 120, 200]));
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

#[derive(Default)]
struct MemoryDirectory {
    users: Vec<Recipient>,
    badges: Vec<BadgeClass>,
    issuers: Vec<Issuer>,
    pages: Vec<BadgePage>,
    assertions: Vec<AssertionContext>,
}

impl AssertionProvider for MemoryDirectory {
    fn badge_class(&self, id: &str) -> Option<BadgeClass> {
        self.badges.iter().find(|b| b.id == id).cloned()
    }

    fn issuer(&self, id: &str) -> Option<Issuer> {
        self.issuers.iter().find(|i| i.id == id).cloned()
    }

    fn badge_page_by_badgeclass(&self, badgeclass: &str) -> Option<BadgePage> {
        self.pages.iter().find(|p| p.badgeclass == badgeclass).cloned()
    }

    fn badge_page(&self, id: u64) -> Option<BadgePage> {
        self.pages.iter().find(|p| p.id == id).cloned()
    }

    fn badge_page_by_slug(&self, slug: &str) -> Option<BadgePage> {
        self.pages.iter().find(|p| p.slug == slug).cloned()
    }

    fn user_by_email(&self, email: &str) -> Option<Recipient> {
        self.users.iter().find(|u| u.email == email).cloned()
    }

    fn user_by_login(&self, login: &str) -> Option<Recipient> {
        self.users.iter().find(|u| u.login == login).cloned()
    }

    fn assertion_for(&self, recipient: &Recipient, badgeclass: &str) -> Option<AssertionContext> {
        self.assertions
            .iter()
            .find(|a| a.recipient == recipient.email && a.badgeclass == badgeclass)
            .cloned()
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    settings: Value,
    media: BTreeMap<MediaId, PathBuf>,
    directory: MemoryDirectory,
}

fn jane() -> Recipient {
    Recipient {
        id: 12,
        login: "jane".to_string(),
        email: "jane@example.org".to_string(),
        display_name: "Jane Doe".to_string(),
        nicename: "jane-doe".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
    }
}

fn site() -> SiteConfig {
    SiteConfig {
        home_url: "https://example.org".to_string(),
        members_slug: "members".to_string(),
        name: "Badges".to_string(),
        admin_email: "admin@example.org".to_string(),
    }
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        std::fs::write(&template, create_test_pdf()).unwrap();
        let badge = dir.path().join("badge.png");
        std::fs::write(&badge, create_badge_png()).unwrap();

        let settings = json!({
            SETTINGS_OPTION: {
                "bf2_certificate_template_id": "5",
                "bf2_certificate_slug": "certificate",
                "name": {
                    "text": "$name$", "align": "C", "pos_x": "40", "pos_y": "90",
                    "width": "200", "font": "times", "style": "B", "size": "24", "color": "#336699"
                },
                "details": {
                    "text": "Issued by $issuer$ on $date$", "align": "L", "pos_x": 40,
                    "pos_y": 120, "width": 200, "font": "helvetica", "style": "", "size": 12
                },
                "portfolio": {
                    "text": "$portfolio$", "align": "R", "pos_x": 40, "pos_y": 140,
                    "width": 200, "font": "helvetica", "style": "U", "size": 10, "color": ""
                },
                "badge": {
                    "text": "$badge$", "align": "C", "pos_x": 139.7, "pos_y": 20, "width": 40
                }
            }
        });

        let directory = MemoryDirectory {
            users: vec![jane()],
            badges: vec![BadgeClass {
                id: "bc1".to_string(),
                name: "First Aid".to_string(),
                issuer: "iss1".to_string(),
                image: badge.display().to_string(),
            }],
            issuers: vec![Issuer {
                id: "iss1".to_string(),
                name: "Acme Academy".to_string(),
            }],
            pages: vec![BadgePage {
                id: 40,
                slug: "first-aid".to_string(),
                badgeclass: "bc1".to_string(),
            }],
            assertions: vec![AssertionContext {
                badgeclass: "bc1".to_string(),
                recipient: "jane@example.org".to_string(),
                issued_on: "2021-03-05T00:00:00Z".to_string(),
                image: badge.display().to_string(),
            }],
        };

        Self {
            media: BTreeMap::from([(5u64, template)]),
            dir,
            settings,
            directory,
        }
    }

    fn storage_root(&self) -> PathBuf {
        self.dir.path().join("attachments")
    }

    fn generator(&self) -> CertificateGenerator<'_> {
        CertificateGenerator::new(
            &self.settings,
            &self.media,
            &self.directory,
            site(),
            CertificateRenderer::default(),
            CertificateStore::new(self.storage_root()),
        )
    }

    fn assertion(&self) -> AssertionContext {
        self.directory.assertions[0].clone()
    }
}

fn page_content(doc: &Document) -> String {
    let page_id = *doc.get_pages().get(&1).unwrap();
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

fn hex(text: &str) -> String {
    text.bytes().map(|b| format!("{b:02X}")).collect()
}

#[test]
fn test_stream_certificate() {
    let fixture = Fixture::new();
    let output = fixture.generator().generate(&fixture.assertion(), false).unwrap();

    let CertificateOutput::Stream(bytes) = output else {
        panic!("expected streamed bytes");
    };
    assert!(bytes.starts_with(b"%PDF"));

    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    let content = page_content(&doc);
    assert!(content.starts_with("q\n/Tpl1 Do\nQ\n"));
    assert!(content.contains(&format!("<{}> Tj", hex("Jane Doe"))));
    assert!(content.contains(&format!("<{}> Tj", hex("Issued by Acme Academy on 2021-03-05"))));
    assert!(content.contains("0.2 0.4 0.6 rg"));
    assert!(content.contains("/Im1 Do"));

    // Centred badge: 40 mm wide at pos_x 139.7, so its left edge is 119.7 mm.
    // 60x30 px gives a 20 mm height, 20 mm below the top of a 612 pt page.
    assert!(content.contains("113.386 0 0 56.693 339.307 498.614 cm"));

    // Nothing written in streaming mode
    assert!(!fixture.storage_root().exists());
}

#[test]
fn test_portfolio_link_annotation() {
    let fixture = Fixture::new();
    let CertificateOutput::Stream(bytes) =
        fixture.generator().generate(&fixture.assertion(), false).unwrap()
    else {
        panic!("expected streamed bytes");
    };

    let doc = Document::load_mem(&bytes).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let annots = doc
        .get_dictionary(page_id)
        .unwrap()
        .get(b"Annots")
        .unwrap()
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(annots.len(), 1);

    let annot = doc.get_dictionary(annots[0].as_reference().unwrap()).unwrap();
    let action = annot.get(b"A").unwrap().as_dict().unwrap();
    assert_eq!(
        action.get(b"URI").unwrap().as_str().unwrap(),
        b"https://example.org/members/jane-doe/"
    );
}

#[test]
fn test_persist_once() {
    let fixture = Fixture::new();
    let generator = fixture.generator();

    let first = generator.generate(&fixture.assertion(), true).unwrap();
    let expected = fixture.storage_root().join("first-aid-jane-12-40.pdf");
    assert_eq!(first, CertificateOutput::Persisted(expected.clone()));

    let written = std::fs::metadata(&expected).unwrap().modified().unwrap();
    let bytes = std::fs::read(&expected).unwrap();
    assert!(Document::load_mem(&bytes).is_ok());

    let second = generator.generate(&fixture.assertion(), true).unwrap();
    assert_eq!(second, CertificateOutput::Persisted(expected.clone()));
    assert_eq!(std::fs::metadata(&expected).unwrap().modified().unwrap(), written);
    assert_eq!(std::fs::read(&expected).unwrap(), bytes);

    let stored = std::fs::read_dir(fixture.storage_root()).unwrap().count();
    assert_eq!(stored, 1);
}

#[test]
fn test_existing_file_returned_without_rendering() {
    let mut fixture = Fixture::new();
    let root = fixture.storage_root();
    std::fs::create_dir_all(&root).unwrap();
    let existing = root.join("first-aid-jane-12-40.pdf");
    std::fs::write(&existing, b"already here").unwrap();

    // A broken field would fail rendering; the stored file short-circuits it
    fixture.settings[SETTINGS_OPTION]["name"]["color"] = json!("not a color");

    let output = fixture.generator().generate(&fixture.assertion(), true).unwrap();
    assert_eq!(output, CertificateOutput::Persisted(existing.clone()));
    assert_eq!(std::fs::read(&existing).unwrap(), b"already here");
}

#[test]
fn test_missing_template_configuration() {
    let mut fixture = Fixture::new();
    fixture.media.clear();

    let result = fixture.generator().generate(&fixture.assertion(), true);
    assert!(matches!(result, Err(CertificateError::ConfigurationMissing)));
    assert!(!fixture.storage_root().exists());

    fixture.settings = json!({});
    let result = fixture.generator().generate(&fixture.assertion(), false);
    assert!(matches!(result, Err(CertificateError::ConfigurationMissing)));
}

#[test]
fn test_unknown_recipient() {
    let fixture = Fixture::new();
    let mut assertion = fixture.assertion();
    assertion.recipient = "nobody@example.org".to_string();

    let result = fixture.generator().generate(&assertion, false);
    assert!(matches!(result, Err(CertificateError::RecipientNotFound(email)) if email == "nobody@example.org"));
}

#[test]
fn test_invalid_color_is_an_error() {
    let mut fixture = Fixture::new();
    fixture.settings[SETTINGS_OPTION]["name"]["color"] = json!("#12345");

    let result = fixture.generator().generate(&fixture.assertion(), false);
    assert!(matches!(result, Err(CertificateError::InvalidColor(_))));
}

#[test]
fn test_missing_badge_image() {
    let mut fixture = Fixture::new();
    fixture.directory.assertions[0].image = "/nonexistent/badge.png".to_string();

    let result = fixture.generator().generate(&fixture.assertion(), false);
    assert!(matches!(result, Err(CertificateError::ImageError(_))));
}

#[test]
fn test_generate_from_route() {
    let fixture = Fixture::new();
    let link = certificate_link(&site().home_url, "certificate", "jane", "first-aid");
    let path = link.trim_start_matches(site().home_url.as_str());
    let route = CertificateRoute::parse("certificate", path).unwrap();

    let output = fixture.generator().generate_for_route(&route, true).unwrap();
    assert_eq!(
        output,
        CertificateOutput::Persisted(fixture.storage_root().join("first-aid-jane-12-40.pdf"))
    );

    let unknown = CertificateRoute {
        member: "jane".to_string(),
        badge: "swimming".to_string(),
    };
    assert!(matches!(
        fixture.generator().generate_for_route(&unknown, false),
        Err(CertificateError::BadgePageNotFound(_))
    ));
}

struct FixedNonce(&'static str);

impl NonceVerifier for FixedNonce {
    fn verify(&self, nonce: &str, action: &str) -> bool {
        nonce == self.0 && action == "send_basic_certificate_email"
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: RefCell<Vec<OutgoingMail>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &OutgoingMail) -> certificate::Result<()> {
        self.sent.borrow_mut().push(mail.clone());
        Ok(())
    }
}

fn send_request(to_email: &str, nonce: &str) -> SendCertificateRequest {
    SendCertificateRequest {
        badge_page: 40,
        nonce: nonce.to_string(),
        to_email: to_email.to_string(),
    }
}

#[test]
fn test_email_endpoint_sends_attachment() {
    let fixture = Fixture::new();
    let generator = fixture.generator();
    let mailer = RecordingMailer::default();
    let endpoint = EmailEndpoint::new(&generator, &FixedNonce("n0nce"), &mailer);

    let response = endpoint.handle(&send_request("friend@example.org", "n0nce"), Some(&jane()));
    assert!(response.success);
    assert_eq!(response.errors, None);

    let sent = mailer.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "friend@example.org");
    assert_eq!(sent[0].from.name, "Jane Doe");
    assert_eq!(sent[0].from.email, "jane@example.org");
    assert_eq!(sent[0].subject, "Certificate: First Aid");

    let attachment: &Path = &sent[0].attachments[0];
    assert_eq!(attachment, fixture.storage_root().join("first-aid-jane-12-40.pdf"));
    assert!(attachment.is_file());
}

#[test]
fn test_email_endpoint_errors() {
    let fixture = Fixture::new();
    let generator = fixture.generator();
    let mailer = RecordingMailer::default();
    let endpoint = EmailEndpoint::new(&generator, &FixedNonce("n0nce"), &mailer);

    let response = endpoint.handle(&send_request("not-an-address", "n0nce"), Some(&jane()));
    assert!(!response.success);
    let errors = response.errors.unwrap();
    assert_eq!(errors.email.as_deref(), Some("Please enter a valid email address."));
    assert_eq!(errors.system, None);

    let response = endpoint.handle(&send_request("friend@example.org", "stale"), Some(&jane()));
    let errors = response.errors.unwrap();
    assert_eq!(errors.email, None);
    assert!(errors.system.is_some());

    let response = endpoint.handle(&send_request("friend@example.org", "n0nce"), None);
    assert!(response.errors.unwrap().system.is_some());

    assert!(mailer.sent.borrow().is_empty());
}
