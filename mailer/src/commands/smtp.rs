use anyhow::ensure;
use mailer_config::Config;
use mailer_email_contracts::{MailRequest, MailService};

use crate::environment;

/// Sends a plain text mail to `recipient` and waits for the delivery.
pub async fn test(config: Config, recipient: String) -> anyhow::Result<()> {
    let mail_service = environment::mail_service(&config.mail)?;

    let sent = mail_service
        .send(
            MailRequest::new()
                .to_email(recipient)
                .subject("Email Deliverability Test")
                .text_content("Email deliverability seems to be working!"),
        )?
        .wait()
        .await?;

    ensure!(sent.success, "Failed to send email");

    Ok(())
}

pub async fn ping(config: Config) -> anyhow::Result<()> {
    let mail_service = environment::mail_service(&config.mail)?;
    mail_service.ping().await?;
    println!("SMTP server is reachable");
    Ok(())
}
