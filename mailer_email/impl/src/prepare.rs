use std::collections::BTreeMap;

use mailer_email_contracts::{MailError, MailRequest};
use mailer_models::{attachment::Attachment, email_address::EmailAddressWithName};

use crate::MailServiceConfig;

/// A filled and validated mail, ready to be turned into a MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedMail {
    /// Sender given by the caller. If missing, the configured sender is used.
    pub sender: Option<EmailAddressWithName>,
    pub receiver: EmailAddressWithName,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub headers: BTreeMap<String, String>,
    pub bounce_token: Option<String>,
}

pub(crate) fn sanitize(mut mail: MailRequest) -> MailRequest {
    for address in [&mut mail.sender_email, &mut mail.receiver_email]
        .into_iter()
        .flatten()
    {
        address.retain(|c| !c.is_whitespace());
    }
    for name in [&mut mail.sender_name, &mut mail.receiver_name]
        .into_iter()
        .flatten()
    {
        *name = name.trim().into();
    }
    mail.sender_email = mail.sender_email.filter(|address| !address.is_empty());

    if !mail.include_html_part {
        mail.html = None;
    }

    mail
}

pub(crate) fn check(
    config: &MailServiceConfig,
    mail: MailRequest,
) -> Result<PreparedMail, MailError> {
    let receiver = EmailAddressWithName::from_parts(
        mail.receiver_email.as_deref().unwrap_or_default(),
        mail.receiver_name.as_deref(),
    )
    .map_err(|_| MailError::InvalidReceiver {
        address: mail.receiver_display(),
    })?;

    let sender = mail
        .sender_email
        .as_deref()
        .map(|address| EmailAddressWithName::from_parts(address, mail.sender_name.as_deref()))
        .transpose()
        .map_err(|_| MailError::InvalidSender {
            address: mail.sender_display(),
        })?;

    if sender.is_none() && config.sender.is_none() {
        return Err(MailError::MissingSender);
    }

    Ok(PreparedMail {
        sender,
        receiver,
        subject: mail.subject.unwrap_or_default(),
        text: mail.text.unwrap_or_default(),
        html: mail.html,
        attachments: mail.attachments,
        headers: mail.headers,
        bounce_token: mail.bounce_token,
    })
}
