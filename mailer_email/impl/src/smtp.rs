use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use lettre::{
    transport::smtp::{authentication::Credentials, AsyncSmtpTransportBuilder},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailer_email_contracts::transport::{DeliveryError, MailTransport};
use mailer_models::Sensitive;
use mailer_utils::{trace_instrument, Apply, Filled};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpTransportConfig {
    /// Without a host no mails are sent at all.
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    /// Authentication is only attempted if a password is set.
    pub password: Option<Sensitive<String>>,
    pub security: SmtpSecurity,
    pub timeout: Duration,
}

impl SmtpTransportConfig {
    /// The configured password, an empty one counts as missing.
    pub fn password(&self) -> Option<&str> {
        self.password
            .as_ref()
            .and_then(|password| password.filled())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpSecurity {
    #[default]
    None,
    StartTls,
    Tls,
}

#[derive(Debug, Clone)]
pub struct SmtpTransportImpl {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    config: Arc<SmtpTransportConfig>,
}

impl SmtpTransportImpl {
    pub fn new(config: SmtpTransportConfig) -> anyhow::Result<Self> {
        let transport = config
            .host
            .filled()
            .map(|host| build_transport(host, &config))
            .transpose()?;

        Ok(Self {
            transport,
            config: config.into(),
        })
    }

    fn configuration_error(&self, reason: impl ToString) -> DeliveryError {
        DeliveryError::Configuration {
            reason: reason.to_string(),
            host: self.config.host.clone().unwrap_or_default(),
            port: self.config.port,
            user: self.config.user.clone().unwrap_or_default(),
            password_used: self.config.password().is_some(),
        }
    }

    fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        self.transport
            .as_ref()
            .ok_or_else(|| self.configuration_error("No SMTP host configured"))
    }
}

fn build_transport(
    host: &str,
    config: &SmtpTransportConfig,
) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = match config.security {
        SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
        SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
    };

    let credentials = config.password().map(|password| {
        Credentials::new(config.user.clone().unwrap_or_default(), password.into())
    });

    Ok(builder
        .port(config.port)
        .timeout(Some(config.timeout))
        .apply_map(credentials, AsyncSmtpTransportBuilder::credentials)
        .build())
}

impl MailTransport for SmtpTransportImpl {
    #[trace_instrument(skip(self, message))]
    async fn deliver(&self, message: Message) -> Result<(), DeliveryError> {
        match self.transport()?.send(message).await {
            Ok(response) if response.is_positive() => Ok(()),
            Ok(response) => Err(DeliveryError::Rejected(response.code().to_string())),
            Err(err) if err.is_permanent() || err.is_transient() => {
                Err(DeliveryError::Rejected(err.to_string()))
            }
            Err(err) => Err(self.configuration_error(err)),
        }
    }

    #[trace_instrument(skip(self))]
    async fn ping(&self) -> anyhow::Result<()> {
        self.transport()?
            .test_connection()
            .await?
            .then_some(())
            .ok_or_else(|| anyhow!("Failed to ping smtp server"))
    }
}
