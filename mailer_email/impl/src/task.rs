use std::sync::Arc;

use mailer_email_contracts::{transport::DeliveryError, MailLog, MailTransport, SentMail};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{mime::build_message, prepare::PreparedMail, MailServiceConfig};

/// Everything a delivery task needs, shared between all tasks.
pub(crate) struct Delivery<Transport> {
    pub transport: Arc<Transport>,
    pub config: Arc<MailServiceConfig>,
    pub logs: Arc<[Arc<dyn MailLog>]>,
    pub permits: Arc<Semaphore>,
}

impl<Transport: MailTransport> Delivery<Transport> {
    /// Builds and sends the message, then reports the outcome. Never fails,
    /// errors end up in the returned record and the logs.
    pub async fn run(self, mail: PreparedMail) -> SentMail {
        let _permit = self.permits.acquire().await;

        let from = mail
            .sender
            .clone()
            .or_else(|| self.config.technical_sender());
        let message_id = from
            .as_ref()
            .map(|from| format!("<{}@{}>", Uuid::new_v4(), from.0.email.domain()));

        let mut sent = SentMail {
            success: false,
            message_id: message_id.clone(),
            sender: from
                .as_ref()
                .map(|from| from.email().into())
                .unwrap_or_default(),
            sender_name: from.as_ref().and_then(|from| from.name()).map(Into::into),
            receiver: mail.receiver.email().into(),
            receiver_name: mail.receiver.name().map(Into::into),
            subject: mail.subject.clone(),
            text: Some(mail.text.clone()),
            html: mail.html.clone(),
        };

        let result = match message_id
            .ok_or_else(|| anyhow::anyhow!("No sender configured"))
            .and_then(|message_id| build_message(&mail, &self.config, message_id))
        {
            Ok(message) => self.transport.deliver(message).await,
            Err(err) => Err(DeliveryError::Other(err)),
        };

        sent.success = result.is_ok();
        report(&self.logs, &sent, result.err());
        sent
    }
}

fn report(logs: &[Arc<dyn MailLog>], mail: &SentMail, error: Option<DeliveryError>) {
    let receiver = &mail.receiver;
    let subject = &mail.subject;
    match error {
        Some(err) if err.is_handled() => debug!(%receiver, %subject, "mail not sent: {err}"),
        Some(err) if logs.is_empty() => {
            warn!(%receiver, %subject, "failed to send mail: {err:#}")
        }
        Some(err) => debug!(%receiver, %subject, "failed to send mail: {err:#}"),
        None => debug!(%receiver, %subject, message_id = ?mail.message_id, "mail sent"),
    }

    for log in logs {
        if let Err(err) = log.log_sent_mail(mail) {
            error!(%receiver, "failed to log sent mail: {err:#}");
        }
    }
}
