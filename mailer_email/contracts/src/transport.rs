use std::future::Future;

use lettre::Message;
use thiserror::Error;

#[cfg_attr(feature = "mock", mockall::automock)]
pub trait MailTransport: Send + Sync + 'static {
    /// Send the message using the envelope stored in it.
    fn deliver(&self, message: Message) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Check whether the mail server is reachable.
    fn ping(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[cfg(feature = "mock")]
impl MockMailTransport {
    pub fn with_deliver(mut self, result: Result<(), DeliveryError>) -> Self {
        self.expect_deliver()
            .once()
            .return_once(move |_| Box::pin(std::future::ready(result)));
        self
    }

    pub fn with_ping(mut self, result: anyhow::Result<()>) -> Self {
        self.expect_ping()
            .once()
            .return_once(move || Box::pin(std::future::ready(result)));
        self
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(
        "Invalid mail configuration: {reason} (Host: {host}, Port: {port}, User: {user}, \
         Password used: {password_used})"
    )]
    Configuration {
        reason: String,
        host: String,
        port: u16,
        user: String,
        password_used: bool,
    },
    #[error("The mail server rejected the mail: {0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeliveryError {
    /// An unconfigured mail server is an expected situation (e.g. in
    /// development) and not worth more than a debug message.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Configuration { host, .. } if host.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration(host: &str) -> DeliveryError {
        DeliveryError::Configuration {
            reason: "connection refused".into(),
            host: host.into(),
            port: 25,
            user: "".into(),
            password_used: false,
        }
    }

    #[test]
    fn handled() {
        assert!(configuration("").is_handled());
        assert!(!configuration("smtp.example.com").is_handled());
        assert!(!DeliveryError::Rejected("550".into()).is_handled());
    }

    #[test]
    fn configuration_message() {
        assert_eq!(
            configuration("smtp.example.com").to_string(),
            "Invalid mail configuration: connection refused (Host: smtp.example.com, Port: 25, \
             User: , Password used: false)"
        );
    }
}
