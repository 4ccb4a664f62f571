use std::{collections::BTreeMap, future::Future};

use mailer_models::attachment::Attachment;
use mailer_templates_contracts::TemplateContext;
use thiserror::Error;
use tokio::task::JoinHandle;

pub use log::{MailLog, SentMail};
pub use transport::MailTransport;

pub mod log;
pub mod transport;

/// Header carrying the bounce token of a mail.
pub const X_BOUNCETOKEN: &str = "X-Bouncetoken";
pub const X_MAILER: &str = "X-Mailer";

#[cfg_attr(feature = "mock", mockall::automock)]
pub trait MailService: Send + Sync + 'static {
    /// Fills, validates and dispatches the given mail.
    ///
    /// Validation happens before this method returns, the delivery itself
    /// runs in a background task. Dropping the returned [`Dispatch`] does not
    /// cancel the delivery.
    fn send(&self, mail: MailRequest) -> Result<Dispatch, MailError>;

    /// Checks whether the mail server is reachable.
    fn ping(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Builder describing a mail to send.
#[derive(Debug, Clone, PartialEq)]
pub struct MailRequest {
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    pub receiver_email: Option<String>,
    pub receiver_name: Option<String>,
    pub subject: Option<String>,
    pub template: Option<TemplateRef>,
    pub include_html_part: bool,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub bounce_token: Option<String>,
    pub lang: Option<String>,
    /// Additional headers. An empty value removes the header of that name.
    pub headers: BTreeMap<String, String>,
}

/// Reference to a mail template from the `mail.templates` configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRef {
    pub name: String,
    pub context: TemplateContext,
}

impl Default for MailRequest {
    fn default() -> Self {
        Self {
            sender_email: None,
            sender_name: None,
            receiver_email: None,
            receiver_name: None,
            subject: None,
            template: None,
            include_html_part: true,
            text: None,
            html: None,
            attachments: Vec::new(),
            bounce_token: None,
            lang: None,
            headers: BTreeMap::new(),
        }
    }
}

impl MailRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_email(mut self, email: impl Into<String>) -> Self {
        self.sender_email = Some(email.into());
        self
    }

    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn from(self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.from_email(email).from_name(name)
    }

    pub fn to_email(mut self, email: impl Into<String>) -> Self {
        self.receiver_email = Some(email.into());
        self
    }

    pub fn to_name(mut self, name: impl Into<String>) -> Self {
        self.receiver_name = Some(name.into());
        self
    }

    pub fn to(self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.to_email(email).to_name(name)
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Fills subject, text, html, headers and attachments from the named
    /// template. Values set explicitly are overwritten when the mail is sent.
    pub fn use_template(mut self, name: impl Into<String>, context: TemplateContext) -> Self {
        self.template = Some(TemplateRef {
            name: name.into(),
            context,
        });
        self
    }

    /// Some mail clients have trouble rendering html, setting this to `false`
    /// sends text only mails.
    pub fn include_html_part(mut self, include_html_part: bool) -> Self {
        self.include_html_part = include_html_part;
        self
    }

    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn html_content(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    /// Sets a token that bounce mails hopefully echo so they can be matched
    /// to this mail.
    pub fn bounce_token(mut self, token: impl Into<String>) -> Self {
        self.bounce_token = Some(token.into());
        self
    }

    /// Sets the language used to pick localized templates. The first non
    /// empty candidate is used, if there is none the language is unchanged.
    pub fn lang<S: AsRef<str>>(mut self, candidates: impl IntoIterator<Item = S>) -> Self {
        if let Some(lang) = candidates
            .into_iter()
            .find(|lang| !lang.as_ref().is_empty())
        {
            self.lang = Some(lang.as_ref().into());
        }
        self
    }

    pub fn receiver_display(&self) -> String {
        display_address(
            self.receiver_email.as_deref().unwrap_or_default(),
            self.receiver_name.as_deref(),
        )
    }

    pub fn sender_display(&self) -> String {
        display_address(
            self.sender_email.as_deref().unwrap_or_default(),
            self.sender_name.as_deref(),
        )
    }
}

/// Formats an address for messages shown to the user, e.g.
/// `max@example.com (Max Mustermann)`.
pub fn display_address(address: &str, name: Option<&str>) -> String {
    match name.filter(|name| !name.is_empty()) {
        Some(name) => format!("{address} ({name})"),
        None => address.into(),
    }
}

/// Errors reported to the caller of [`MailService::send`]. These are meant to
/// be shown to the user.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("'{address}' is not a valid email address.")]
    InvalidAddress { address: String },
    #[error("'{address}' is not a valid receiver address.")]
    InvalidReceiver { address: String },
    #[error("'{address}' is not a valid sender address.")]
    InvalidSender { address: String },
    #[error("Neither the mail nor the SMTP configuration specify a sender.")]
    MissingSender,
    #[error("Unknown mail template: {0}")]
    UnknownTemplate(String),
    #[error(
        "Cannot send mail to '{receiver}' from '{sender}' with subject '{subject}': {source:#}"
    )]
    Prepare {
        receiver: String,
        sender: String,
        subject: String,
        source: anyhow::Error,
    },
}

/// Handle of a mail delivery running in the background.
#[derive(Debug)]
pub struct Dispatch(JoinHandle<SentMail>);

impl Dispatch {
    pub fn new(handle: JoinHandle<SentMail>) -> Self {
        Self(handle)
    }

    /// Waits for the delivery to finish.
    pub async fn wait(self) -> anyhow::Result<SentMail> {
        Ok(self.0.await?)
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}
