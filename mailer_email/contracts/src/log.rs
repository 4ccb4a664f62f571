/// Record of a delivery attempt handed to every registered [`MailLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub success: bool,
    pub message_id: Option<String>,
    pub sender: String,
    pub sender_name: Option<String>,
    pub receiver: String,
    pub receiver_name: Option<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

#[cfg_attr(feature = "mock", mockall::automock)]
pub trait MailLog: Send + Sync + 'static {
    /// Record the outcome of a delivery attempt.
    fn log_sent_mail(&self, mail: &SentMail) -> anyhow::Result<()>;
}

#[cfg(feature = "mock")]
impl MockMailLog {
    pub fn with_log_sent_mail(
        mut self,
        receiver: impl Into<String>,
        success: bool,
        result: anyhow::Result<()>,
    ) -> Self {
        let receiver = receiver.into();
        self.expect_log_sent_mail()
            .once()
            .withf(move |mail| mail.receiver == receiver && mail.success == success)
            .return_once(|_| result);
        self
    }
}
