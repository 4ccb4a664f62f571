use std::{collections::BTreeMap, sync::Arc};

use mailer_email_contracts::{Dispatch, MailError, MailLog, MailRequest, MailService, MailTransport};
use mailer_models::{
    email_address::{EmailAddress, EmailAddressWithName},
    template::MailTemplate,
};
use mailer_templates_contracts::TemplateService;
use mailer_utils::{trace_instrument, Filled};
use task::Delivery;
use tokio::sync::Semaphore;

pub use validation::{fail_for_invalid_email, is_valid_mail_address};

mod fill;
mod mime;
mod prepare;
pub mod smtp;
mod task;
mod validation;

#[derive(Debug, Clone, Default)]
pub struct MailServiceConfig {
    /// Technical sender, used if a mail does not specify a sender.
    pub sender: Option<EmailAddress>,
    pub sender_name: Option<String>,
    /// Whether mails with an explicit sender get the technical sender as
    /// `Sender` header and SMTP envelope sender.
    pub use_sender_and_envelope_from: bool,
    /// Value of the `X-Mailer` header.
    pub mailer: Option<String>,
    pub default_lang: String,
    pub max_concurrent_deliveries: usize,
    pub templates: BTreeMap<String, MailTemplate>,
}

impl MailServiceConfig {
    pub fn technical_sender(&self) -> Option<EmailAddressWithName> {
        let sender = self.sender.clone()?;
        Some(match self.sender_name.filled() {
            Some(name) => sender.with_name(name.into()),
            None => sender.into(),
        })
    }
}

/// Sends mails in background tasks.
///
/// [`MailService::send`] spawns a Tokio task and must therefore be called from
/// within a Tokio runtime.
pub struct MailServiceImpl<Transport, Template> {
    transport: Arc<Transport>,
    templates: Template,
    config: Arc<MailServiceConfig>,
    logs: Arc<[Arc<dyn MailLog>]>,
    permits: Arc<Semaphore>,
}

impl<Transport, Template> MailServiceImpl<Transport, Template> {
    pub fn new(transport: Transport, templates: Template, config: MailServiceConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrent_deliveries.max(1));
        Self {
            transport: transport.into(),
            templates,
            config: config.into(),
            logs: Arc::new([]),
            permits: permits.into(),
        }
    }

    /// Registers a log that is informed about every delivery attempt.
    pub fn with_log(mut self, log: impl MailLog) -> Self {
        self.logs = self
            .logs
            .iter()
            .cloned()
            .chain([Arc::new(log) as Arc<dyn MailLog>])
            .collect();
        self
    }
}

impl<Transport, Template> MailService for MailServiceImpl<Transport, Template>
where
    Transport: MailTransport,
    Template: TemplateService,
{
    #[trace_instrument(skip(self))]
    fn send(&self, mail: MailRequest) -> Result<Dispatch, MailError> {
        let mail = fill::fill_template(&self.templates, &self.config, mail)?;
        let mail = prepare::check(&self.config, prepare::sanitize(mail))?;

        let delivery = Delivery {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            logs: Arc::clone(&self.logs),
            permits: Arc::clone(&self.permits),
        };

        Ok(Dispatch::new(tokio::spawn(delivery.run(mail))))
    }

    #[trace_instrument(skip(self))]
    async fn ping(&self) -> anyhow::Result<()> {
        self.transport.ping().await
    }
}
