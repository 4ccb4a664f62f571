use std::time::{Duration, Instant};

use anyhow::Context;
use mailer_email_contracts::{MailRequest, MailService};
use mailer_email_impl::{
    smtp::{SmtpSecurity, SmtpTransportConfig, SmtpTransportImpl, DEFAULT_TIMEOUT},
    MailServiceConfig, MailServiceImpl,
};
use mailer_models::attachment::Attachment;
use mailer_templates_impl::TemplateServiceImpl;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires smtp4dev, set SMTP4DEV_URL"]
async fn send_email() {
    let client = setup().await;

    let sent = client
        .mail
        .send(
            MailRequest::new()
                .to("test@example.com", "Test")
                .subject("The Subject")
                .text_content("Hello World!")
                .html_content("<h1>Hello World!</h1>")
                .header("X-Campaign", "integration")
                .bounce_token("bounce-1"),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(sent.success);

    let mail = client.wait_for_mail().await;
    assert_eq!(mail.from, client.sender);
    assert_eq!(mail.to, "test@example.com");
    assert_eq!(mail.subject, "The Subject");

    let details = client.fetch_email_details(mail.id).await;
    assert!(details.plain_text);
    let header = |name: &str| {
        details
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    };
    assert_eq!(header("X-Campaign"), Some("integration"));
    assert_eq!(header("X-Bouncetoken"), Some("bounce-1"));
}

#[tokio::test]
#[ignore = "requires smtp4dev, set SMTP4DEV_URL"]
async fn send_email_with_attachment() {
    let client = setup().await;

    let sent = client
        .mail
        .send(
            MailRequest::new()
                .to_email("test@example.com")
                .subject("Report")
                .text_content("See attachment")
                .attachment(Attachment::guessed("report.txt", "42")),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(sent.success);

    let mail = client.wait_for_mail().await;
    let source = client.fetch_email_source(mail.id).await;
    assert!(source.contains("Content-Type: multipart/mixed"));
    assert!(source.contains("filename=\"report.txt\""));
}

struct TestClient {
    mail: MailServiceImpl<SmtpTransportImpl, TemplateServiceImpl>,
    sender: String,
    smtp4dev_url: Url,
}

impl TestClient {
    async fn reset(&self) {
        reqwest::Client::new()
            .delete(self.smtp4dev_url.join("api/Messages/*").unwrap())
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }

    async fn wait_for_mail(&self) -> EmailSummary {
        let now = Instant::now();
        while now.elapsed() < Duration::from_secs(2) {
            let mut mailbox = self.fetch_mailbox().await;
            if let Some(mail) = mailbox.pop() {
                return mail;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("No email received");
    }

    async fn fetch_mailbox(&self) -> Vec<EmailSummary> {
        reqwest::Client::new()
            .get(self.smtp4dev_url.join("api/Messages").unwrap())
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json::<PaginationResponse<_>>()
            .await
            .unwrap()
            .results
    }

    async fn fetch_email_details(&self, id: Uuid) -> EmailDetails {
        reqwest::Client::new()
            .get(
                self.smtp4dev_url
                    .join(&format!("api/Messages/{id}"))
                    .unwrap(),
            )
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn fetch_email_source(&self, id: Uuid) -> String {
        reqwest::Client::new()
            .get(
                self.smtp4dev_url
                    .join(&format!("api/Messages/{id}/source"))
                    .unwrap(),
            )
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .text()
            .await
            .unwrap()
    }
}

async fn setup() -> TestClient {
    let config = mailer_config::load().unwrap().mail;
    let smtp = config.smtp;

    let transport = SmtpTransportImpl::new(SmtpTransportConfig {
        host: smtp.host,
        port: smtp.port,
        user: smtp.user,
        password: smtp.password,
        security: SmtpSecurity::None,
        timeout: smtp.timeout.map_or(DEFAULT_TIMEOUT, |timeout| timeout.0),
    })
    .unwrap();

    let sender = smtp.sender.clone().unwrap();
    let mail = MailServiceImpl::new(
        transport,
        TemplateServiceImpl::from_raw([]).unwrap(),
        MailServiceConfig {
            sender: Some(sender.clone()),
            sender_name: smtp.sender_name,
            use_sender_and_envelope_from: smtp.use_sender_and_envelope_from,
            mailer: config.mailer,
            default_lang: config.default_lang,
            max_concurrent_deliveries: config.max_concurrent_deliveries,
            templates: Default::default(),
        },
    );

    let smtp4dev_url = std::env::var("SMTP4DEV_URL")
        .context("Failed to read SMTP4DEV_URL environment variable")
        .unwrap()
        .parse()
        .context("Failed to parse SMTP4DEV_URL environment variable")
        .unwrap();

    let client = TestClient {
        mail,
        sender: sender.to_string(),
        smtp4dev_url,
    };

    client.reset().await;

    client
}

#[derive(Debug, Deserialize)]
struct PaginationResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct EmailSummary {
    id: Uuid,
    from: String,
    to: String,
    subject: String,
}

#[derive(Debug, Deserialize)]
struct EmailDetails {
    headers: Vec<EmailHeader>,
    #[serde(rename = "hasPlainTextBody")]
    plain_text: bool,
}

#[derive(Debug, Deserialize)]
struct EmailHeader {
    name: String,
    value: String,
}
