//! Token substitution for certificate fields
//!
//! Field text is scanned once into literal runs and `$token$` markers.
//! Substituted values are never rescanned, so a recipient name such as
//! `$issuer$` is printed as written.

use crate::context::SubstitutionContext;
use crate::fields::ResolvedField;
use crate::settings::FieldSettings;
use crate::{CertificateError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Known placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Name,
    Date,
    Issuer,
    Portfolio,
    Badge,
}

impl Token {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Token::Name),
            "date" => Some(Token::Date),
            "issuer" => Some(Token::Issuer),
            "portfolio" => Some(Token::Portfolio),
            "badge" => Some(Token::Badge),
            _ => None,
        }
    }

    /// The token as written in field text
    pub fn marker(self) -> &'static str {
        match self {
            Token::Name => "$name$",
            Token::Date => "$date$",
            Token::Issuer => "$issuer$",
            Token::Portfolio => "$portfolio$",
            Token::Badge => "$badge$",
        }
    }
}

/// A piece of scanned field text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Token(Token),
}

/// Split text into literal runs and known tokens
///
/// Unknown `$word$` sequences stay literal. Their closing `$` may still open
/// a following token, so `$x$name$` contains a `$name$` token.
pub fn tokenize(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find('$').map(|i| cursor + i) {
        let Some(close) = text[open + 1..].find('$').map(|i| open + 1 + i) else {
            break;
        };

        match Token::from_name(&text[open + 1..close]) {
            Some(token) => {
                if literal_start < open {
                    segments.push(Segment::Literal(&text[literal_start..open]));
                }
                segments.push(Segment::Token(token));
                cursor = close + 1;
                literal_start = cursor;
            }
            None => cursor = close,
        }
    }

    if literal_start < text.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }

    segments
}

/// Format an issuance timestamp as `YYYY-MM-DD`
///
/// Accepts RFC 3339 (the date is read in the timestamp's own offset),
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`.
pub fn format_issued_on(raw: &str) -> Result<String> {
    let raw = raw.trim();

    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| CertificateError::InvalidDate(raw.to_string()))?;

    Ok(date.format("%Y-%m-%d").to_string())
}

/// Resolve a field's tokens against one certificate's values
///
/// Text containing `$badge$` anywhere becomes an image field whose source is
/// the raw text with every `$badge$` replaced by the badge image; other
/// tokens are not expanded there. Otherwise every known token is replaced and
/// `$portfolio$` also links the cell to the portfolio URL.
pub fn substitute(field: &FieldSettings, ctx: &SubstitutionContext) -> Result<ResolvedField> {
    let badge = Token::Badge.marker();
    if field.text.contains(badge) {
        return Ok(ResolvedField::Image {
            settings: field.clone(),
            source: field.text.replace(badge, &ctx.badge_image),
        });
    }

    let segments = tokenize(&field.text);
    let mut text = String::with_capacity(field.text.len());
    let mut link = None;
    let mut date = None;

    for segment in &segments {
        match segment {
            Segment::Literal(literal) => text.push_str(literal),
            Segment::Token(Token::Name) => text.push_str(&ctx.recipient_name),
            Segment::Token(Token::Issuer) => text.push_str(&ctx.issuer_name),
            Segment::Token(Token::Date) => {
                if date.is_none() {
                    date = Some(format_issued_on(&ctx.issued_on)?);
                }
                if let Some(date) = &date {
                    text.push_str(date);
                }
            }
            Segment::Token(Token::Portfolio) => {
                text.push_str(&ctx.portfolio_url);
                link = Some(ctx.portfolio_url.clone());
            }
            // Unreachable: badge text takes the image path above
            Segment::Token(Token::Badge) => {}
        }
    }

    Ok(ResolvedField::Text {
        settings: field.clone(),
        text,
        link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Align;
    use pretty_assertions::assert_eq;

    fn field(text: &str) -> FieldSettings {
        FieldSettings {
            text: text.to_string(),
            align: Align::Left,
            pos_x: 10.0,
            pos_y: 20.0,
            width: 100.0,
            font: "helvetica".to_string(),
            style: String::new(),
            size: 12.0,
            color: None,
        }
    }

    fn context() -> SubstitutionContext {
        SubstitutionContext {
            issued_on: "2021-03-05T00:00:00Z".to_string(),
            issuer_name: "Acme Academy".to_string(),
            recipient_name: "Jane Doe".to_string(),
            portfolio_url: "https://example.org/members/jane-doe/".to_string(),
            badge_image: "/badges/bc1.png".to_string(),
        }
    }

    fn text_of(resolved: ResolvedField) -> (String, Option<String>) {
        match resolved {
            ResolvedField::Text { text, link, .. } => (text, link),
            other => panic!("expected a text field, got {other:?}"),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Hi $name$, $foo$!"),
            vec![
                Segment::Literal("Hi "),
                Segment::Token(Token::Name),
                Segment::Literal(", $foo$!"),
            ]
        );
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("$ only"), vec![Segment::Literal("$ only")]);
    }

    #[test]
    fn test_tokenize_closing_dollar_reused() {
        assert_eq!(
            tokenize("$x$name$"),
            vec![Segment::Literal("$x"), Segment::Token(Token::Name)]
        );
    }

    #[test]
    fn test_all_text_tokens() {
        let (text, link) = text_of(
            substitute(&field("$name$ / $issuer$ / $date$ / $portfolio$"), &context()).unwrap(),
        );
        assert_eq!(
            text,
            "Jane Doe / Acme Academy / 2021-03-05 / https://example.org/members/jane-doe/"
        );
        assert_eq!(link.as_deref(), Some("https://example.org/members/jane-doe/"));
    }

    #[test]
    fn test_repeated_tokens() {
        let (text, link) = text_of(substitute(&field("$name$ $name$"), &context()).unwrap());
        assert_eq!(text, "Jane Doe Jane Doe");
        assert_eq!(link, None);
    }

    #[test]
    fn test_portfolio_alone() {
        let (text, link) = text_of(substitute(&field("$portfolio$"), &context()).unwrap());
        assert_eq!(text, "https://example.org/members/jane-doe/");
        assert_eq!(link.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_unknown_tokens_verbatim() {
        let (text, _) = text_of(substitute(&field("$foo$ and $NAME$ stay"), &context()).unwrap());
        assert_eq!(text, "$foo$ and $NAME$ stay");
    }

    #[test]
    fn test_values_not_rescanned() {
        let ctx = SubstitutionContext {
            recipient_name: "$issuer$".to_string(),
            ..context()
        };
        let (text, _) = text_of(substitute(&field("$name$"), &ctx).unwrap());
        assert_eq!(text, "$issuer$");
    }

    #[test]
    fn test_badge_makes_image_field() {
        let resolved = substitute(&field("$badge$"), &context()).unwrap();
        assert_eq!(
            resolved,
            ResolvedField::Image {
                settings: field("$badge$"),
                source: "/badges/bc1.png".to_string(),
            }
        );
    }

    #[test]
    fn test_badge_ignores_other_tokens() {
        let resolved = substitute(&field("$name$$badge$"), &context()).unwrap();
        match resolved {
            ResolvedField::Image { source, .. } => assert_eq!(source, "$name$/badges/bc1.png"),
            other => panic!("expected an image field, got {other:?}"),
        }
    }

    #[test]
    fn test_badge_sharing_dollar_with_previous_token() {
        // The closing `$` of `$name$` also opens `$badge$`
        let resolved = substitute(&field("$name$badge$"), &context()).unwrap();
        assert_eq!(
            resolved,
            ResolvedField::Image {
                settings: field("$name$badge$"),
                source: "$name/badges/bc1.png".to_string(),
            }
        );
    }

    #[test]
    fn test_badge_replaced_everywhere() {
        let resolved = substitute(&field("$badge$|$badge$"), &context()).unwrap();
        match resolved {
            ResolvedField::Image { source, .. } => {
                assert_eq!(source, "/badges/bc1.png|/badges/bc1.png")
            }
            other => panic!("expected an image field, got {other:?}"),
        }
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(format_issued_on("2021-03-05T00:00:00Z").unwrap(), "2021-03-05");
        assert_eq!(format_issued_on("2021-03-05T23:30:00-05:00").unwrap(), "2021-03-05");
        assert_eq!(format_issued_on("2021-03-05 14:00:00").unwrap(), "2021-03-05");
        assert_eq!(format_issued_on("2021-03-05").unwrap(), "2021-03-05");
        assert!(matches!(
            format_issued_on("March 5th"),
            Err(CertificateError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_bad_date_only_fails_when_used() {
        let ctx = SubstitutionContext {
            issued_on: "garbage".to_string(),
            ..context()
        };
        assert!(substitute(&field("$name$"), &ctx).is_ok());
        assert!(substitute(&field("$date$"), &ctx).is_err());
    }
}
