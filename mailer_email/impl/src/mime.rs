use std::collections::BTreeMap;

use anyhow::Context;
use lettre::{
    address::Envelope,
    message::{
        header::{ContentDisposition, ContentType, Header, HeaderName, HeaderValue},
        MessageBuilder, MultiPart, SinglePart, SinglePartBuilder,
    },
    Message,
};
use mailer_email_contracts::{X_BOUNCETOKEN, X_MAILER};
use mailer_models::attachment::Attachment;
use mailer_utils::{Apply, Filled};

use crate::{prepare::PreparedMail, MailServiceConfig};

const UMLAUT_ENTITIES: [(char, &str); 7] = [
    ('ä', "&auml;"),
    ('ö', "&ouml;"),
    ('ü', "&uuml;"),
    ('Ä', "&Auml;"),
    ('Ö', "&Ouml;"),
    ('Ü', "&Uuml;"),
    ('ß', "&szlig;"),
];

/// Builds the MIME message including the SMTP envelope.
pub(crate) fn build_message(
    mail: &PreparedMail,
    config: &MailServiceConfig,
    message_id: String,
) -> anyhow::Result<Message> {
    let technical_sender = config.technical_sender();
    let from = mail
        .sender
        .clone()
        .or_else(|| technical_sender.clone())
        .context("No sender configured")?;

    // The configured sender is the technical sender of mails sent on behalf
    // of somebody else, bounces go to its address.
    let technical_sender = technical_sender
        .filter(|_| mail.sender.is_some() && config.use_sender_and_envelope_from);
    let envelope = technical_sender
        .as_ref()
        .map(|sender| {
            Envelope::new(
                Some(sender.0.email.clone()),
                vec![mail.receiver.0.email.clone()],
            )
        })
        .transpose()?;

    let headers = merge_headers(default_headers(mail, config), &mail.headers);

    let builder = Message::builder()
        .from(from.0)
        .apply_map(technical_sender, |builder, sender| builder.sender(sender.0))
        .to(mail.receiver.0.clone())
        .subject(&mail.subject)
        .date_now()
        .message_id(Some(message_id))
        .apply_map(envelope, MessageBuilder::envelope);
    let builder = headers
        .into_iter()
        .try_fold(builder, |builder, (name, value)| {
            RawHeader::new(name, value).map(|header| builder.header(header))
        })?;

    let mut message = match create_content(mail)? {
        Content::Single(part) => builder.singlepart(part),
        Content::Multi(part) => builder.multipart(part),
    }?;

    // An empty custom header also removes headers set by the builder, such as
    // `Sender` or `Date`.
    for (name, _) in mail.headers.iter().filter(|(_, value)| value.is_empty()) {
        message.headers_mut().remove_raw(name);
    }

    Ok(message)
}

enum Content {
    Single(SinglePart),
    Multi(MultiPart),
}

/// Assembles the body:
///
/// ```text
/// multipart/mixed            (only with regular attachments)
/// ├── multipart/alternative
/// │   ├── text/plain
/// │   ├── text/html          (optional)
/// │   └── alternative attachments
/// └── regular attachments
/// ```
///
/// A mail with neither html nor attachments is a single `text/plain` part.
fn create_content(mail: &PreparedMail) -> anyhow::Result<Content> {
    let text = SinglePart::plain(mail.text.clone());
    let html = mail.html.filled();
    if html.is_none() && mail.attachments.is_empty() {
        return Ok(Content::Single(text));
    }

    let (alternatives, attachments): (Vec<_>, Vec<_>) = mail
        .attachments
        .iter()
        .partition(|attachment| attachment.alternative);

    let alternative = MultiPart::alternative()
        .singlepart(text)
        .apply_map(html, |part, html| {
            part.singlepart(SinglePart::html(replace_umlauts(html)))
        });
    let alternative = alternatives
        .into_iter()
        .try_fold(alternative, |part, attachment| {
            attachment_part(attachment).map(|attachment| part.singlepart(attachment))
        })?;

    if attachments.is_empty() {
        return Ok(Content::Multi(alternative));
    }

    let mixed = attachments
        .into_iter()
        .try_fold(MultiPart::mixed().multipart(alternative), |part, attachment| {
            attachment_part(attachment).map(|attachment| part.singlepart(attachment))
        })?;

    Ok(Content::Multi(mixed))
}

fn attachment_part(attachment: &Attachment) -> anyhow::Result<SinglePart> {
    let content_type = ContentType::parse(&attachment.mime_type).with_context(|| {
        format!(
            "Invalid content type {:?} of attachment {}",
            attachment.mime_type, attachment.name
        )
    })?;

    let removed = |name: &str| {
        attachment
            .headers
            .iter()
            .any(|(header, value)| value.is_empty() && header.eq_ignore_ascii_case(name))
    };

    let builder = SinglePart::builder()
        .apply_map(
            (!removed("Content-Type")).then_some(content_type),
            SinglePartBuilder::header,
        )
        .apply_map(
            (!removed("Content-Disposition"))
                .then(|| ContentDisposition::attachment(&attachment.name)),
            SinglePartBuilder::header,
        );
    let builder = attachment
        .headers
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .try_fold(builder, |builder, (name, value)| {
            RawHeader::new(name, value).map(|header| builder.header(header))
        })?;

    Ok(builder.body(attachment.content.clone()))
}

fn default_headers<'a>(
    mail: &'a PreparedMail,
    config: &'a MailServiceConfig,
) -> Vec<(&'a str, &'a str)> {
    let mut headers = Vec::new();
    if let Some(mailer) = config.mailer.as_deref() {
        headers.push((X_MAILER, mailer));
    }
    if let Some(token) = mail.bounce_token.as_deref() {
        headers.push((X_BOUNCETOKEN, token));
    }
    headers
}

/// Adds the custom headers to the default ones. A custom header replaces a
/// default header of the same name, an empty value removes it.
fn merge_headers<'a>(
    mut headers: Vec<(&'a str, &'a str)>,
    custom: &'a BTreeMap<String, String>,
) -> Vec<(&'a str, &'a str)> {
    for (name, value) in custom {
        headers.retain(|(header, _)| !header.eq_ignore_ascii_case(name));
        if !value.is_empty() {
            headers.push((name, value));
        }
    }
    headers
}

pub(crate) fn replace_umlauts(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for c in html.chars() {
        match UMLAUT_ENTITIES.iter().find(|(umlaut, _)| *umlaut == c) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

/// Header whose name is only known at runtime.
///
/// lettre identifies headers by their type, but stores and replaces them by
/// the name of the rendered [`HeaderValue`], so the static name is never used
/// for lookups.
#[derive(Debug, Clone)]
struct RawHeader(HeaderValue);

impl RawHeader {
    fn new(name: &str, value: &str) -> anyhow::Result<Self> {
        let name = HeaderName::new_from_ascii(name.into())
            .with_context(|| format!("Invalid header name {name:?}"))?;
        Ok(Self(HeaderValue::new(name, value.into())))
    }
}

impl Header for RawHeader {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Raw-Header")
    }

    fn parse(_s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Err("raw headers cannot be parsed".into())
    }

    fn display(&self) -> HeaderValue {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use mailer_models::email_address::EmailAddressWithName;

    use super::*;

    #[test]
    fn text_only() {
        // Arrange
        let mail = mail();

        // Act
        let message = build(&mail, &config());

        // Assert
        assert!(message.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(!message.contains("multipart/"));
        assert!(message.contains("Hello Max"));
    }

    #[test]
    fn empty_text() {
        let mail = PreparedMail {
            text: String::new(),
            ..mail()
        };
        let message = build(&mail, &config());
        assert!(message.contains("Content-Type: text/plain; charset=utf-8"));
    }

    #[test]
    fn empty_html() {
        // Arrange
        let mail = PreparedMail {
            html: Some(String::new()),
            ..mail()
        };

        // Act
        let message = build(&mail, &config());

        // Assert
        assert!(message.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(!message.contains("multipart/"));
        assert!(!message.contains("text/html"));
    }

    #[test]
    fn empty_html_with_attachment() {
        let mail = PreparedMail {
            html: Some(String::new()),
            attachments: vec![Attachment::new("a.txt", "text/plain", "a")],
            ..mail()
        };

        let message = build(&mail, &config());

        assert!(message.contains("Content-Type: multipart/mixed"));
        assert!(!message.contains("text/html"));
    }

    #[test]
    fn text_and_html() {
        // Arrange
        let mail = PreparedMail {
            html: Some("<p>Grüße</p>".into()),
            ..mail()
        };

        // Act
        let message = build(&mail, &config());

        // Assert
        assert!(message.contains("Content-Type: multipart/alternative"));
        assert!(!message.contains("multipart/mixed"));
        assert!(message.contains("&uuml;"));
        assert!(message.contains("&szlig;"));
        let text = message.find("Content-Type: text/plain").unwrap();
        let html = message.find("Content-Type: text/html").unwrap();
        assert!(text < html);
    }

    #[test]
    fn alternative_attachment() {
        // Arrange
        let mail = PreparedMail {
            attachments: vec![Attachment::new(
                "invite.ics",
                "text/calendar; method=REQUEST",
                "BEGIN:VCALENDAR",
            )
            .as_alternative()
            .with_header("Content-Disposition", "")],
            ..mail()
        };

        // Act
        let message = build(&mail, &config());

        // Assert
        assert!(message.contains("Content-Type: multipart/alternative"));
        assert!(!message.contains("multipart/mixed"));
        assert!(message.contains("Content-Type: text/calendar; method=REQUEST"));
        assert!(!message.contains("Content-Disposition"));
    }

    #[test]
    fn mixed_attachments() {
        // Arrange
        let mail = PreparedMail {
            html: Some("<p>Hi</p>".into()),
            attachments: vec![
                Attachment::new("invite.ics", "text/calendar", "BEGIN:VCALENDAR").as_alternative(),
                Attachment::new("report.pdf", "application/pdf", b"%PDF-1.4".to_vec())
                    .with_header("X-Report", "monthly"),
            ],
            ..mail()
        };

        // Act
        let message = build(&mail, &config());

        // Assert
        let mixed = message.find("Content-Type: multipart/mixed").unwrap();
        let alternative = message.find("Content-Type: multipart/alternative").unwrap();
        let calendar = message.find("Content-Type: text/calendar").unwrap();
        let pdf = message.find("Content-Type: application/pdf").unwrap();
        assert!(mixed < alternative);
        assert!(alternative < calendar);
        assert!(calendar < pdf);
        assert!(message.contains("Content-Disposition: attachment; filename=\"report.pdf\""));
        assert!(message.contains("X-Report: monthly"));
    }

    #[test]
    fn invalid_attachment_content_type() {
        let mail = PreparedMail {
            attachments: vec![Attachment::new("a", "not a mime type", "")],
            ..mail()
        };
        build_message(&mail, &config(), message_id()).unwrap_err();
    }

    #[test]
    fn headers() {
        // Arrange
        let mail = PreparedMail {
            bounce_token: Some("bounce-42".into()),
            headers: [
                ("X-Campaign".into(), "spring".into()),
                ("x-mailer".into(), "".into()),
            ]
            .into(),
            ..mail()
        };

        // Act
        let message = build_message(&mail, &config(), message_id()).unwrap();

        // Assert
        let headers = message.headers();
        assert_eq!(headers.get_raw("X-Bouncetoken"), Some("bounce-42"));
        assert_eq!(headers.get_raw("X-Campaign"), Some("spring"));
        assert_eq!(headers.get_raw("X-Mailer"), None);
        assert_eq!(headers.get_raw("Message-ID"), Some("<42@example.com>"));
        assert_eq!(headers.get_raw("MIME-Version"), Some("1.0"));
        assert!(headers.get_raw("Date").is_some());
    }

    #[test]
    fn default_mailer_header() {
        let message = build_message(&mail(), &config(), message_id()).unwrap();
        assert_eq!(message.headers().get_raw("X-Mailer"), Some("mailer"));
        assert_eq!(message.headers().get_raw("X-Bouncetoken"), None);
    }

    #[test]
    fn invalid_header_name() {
        let mail = PreparedMail {
            headers: [("X Campaign".into(), "spring".into())].into(),
            ..mail()
        };
        build_message(&mail, &config(), message_id()).unwrap_err();
    }

    #[test]
    fn configured_sender() {
        // Act
        let message = build_message(&mail(), &config(), message_id()).unwrap();

        // Assert
        assert_eq!(
            message.headers().get_raw("From"),
            Some("Example <noreply@example.com>")
        );
        assert_eq!(message.headers().get_raw("Sender"), None);
        assert_eq!(envelope_from(&message).as_deref(), Some("noreply@example.com"));
    }

    #[test]
    fn sender_and_envelope_from() {
        // Arrange
        let mail = PreparedMail {
            sender: Some(
                EmailAddressWithName::from_parts("alice@example.org", Some("Alice")).unwrap(),
            ),
            ..mail()
        };

        // Act
        let message = build_message(&mail, &config(), message_id()).unwrap();

        // Assert
        assert_eq!(
            message.headers().get_raw("From"),
            Some("Alice <alice@example.org>")
        );
        assert_eq!(
            message.headers().get_raw("Sender"),
            Some("Example <noreply@example.com>")
        );
        assert_eq!(envelope_from(&message).as_deref(), Some("noreply@example.com"));
        assert_eq!(
            message
                .envelope()
                .to()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["max@example.com"]
        );
    }

    #[test]
    fn remove_builder_headers() {
        // Arrange
        let mail = PreparedMail {
            sender: Some(EmailAddressWithName::from_parts("alice@example.org", None).unwrap()),
            headers: [("sender".into(), "".into()), ("Date".into(), "".into())].into(),
            ..mail()
        };

        // Act
        let message = build_message(&mail, &config(), message_id()).unwrap();

        // Assert
        assert_eq!(message.headers().get_raw("Sender"), None);
        assert_eq!(message.headers().get_raw("Date"), None);
        assert_eq!(message.headers().get_raw("From"), Some("alice@example.org"));
        assert_eq!(envelope_from(&message).as_deref(), Some("noreply@example.com"));
    }

    #[test]
    fn sender_without_envelope_from() {
        // Arrange
        let mail = PreparedMail {
            sender: Some(EmailAddressWithName::from_parts("alice@example.org", None).unwrap()),
            ..mail()
        };
        let config = MailServiceConfig {
            use_sender_and_envelope_from: false,
            ..config()
        };

        // Act
        let message = build_message(&mail, &config, message_id()).unwrap();

        // Assert
        assert_eq!(message.headers().get_raw("Sender"), None);
        assert_eq!(envelope_from(&message).as_deref(), Some("alice@example.org"));
    }

    #[test]
    fn umlauts() {
        assert_eq!(
            replace_umlauts("<p>Schöne Grüße, Ärger & Übermaß</p>"),
            "<p>Sch&ouml;ne Gr&uuml;&szlig;e, &Auml;rger & &Uuml;berma&szlig;</p>"
        );
    }

    fn build(mail: &PreparedMail, config: &MailServiceConfig) -> String {
        let message = build_message(mail, config, message_id()).unwrap();
        String::from_utf8(message.formatted()).unwrap()
    }

    fn envelope_from(message: &Message) -> Option<String> {
        message.envelope().from().map(ToString::to_string)
    }

    fn message_id() -> String {
        "<42@example.com>".into()
    }

    fn mail() -> PreparedMail {
        PreparedMail {
            sender: None,
            receiver: EmailAddressWithName::from_parts("max@example.com", Some("Max")).unwrap(),
            subject: "Hello".into(),
            text: "Hello Max".into(),
            html: None,
            attachments: Vec::new(),
            headers: BTreeMap::new(),
            bounce_token: None,
        }
    }

    fn config() -> MailServiceConfig {
        MailServiceConfig {
            sender: Some("noreply@example.com".parse().unwrap()),
            sender_name: Some("Example".into()),
            use_sender_and_envelope_from: true,
            mailer: Some("mailer".into()),
            ..Default::default()
        }
    }
}
