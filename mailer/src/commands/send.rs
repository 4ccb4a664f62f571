use std::path::PathBuf;

use anyhow::{anyhow, ensure, Context};
use clap::Args;
use mailer_config::Config;
use mailer_email_contracts::{MailRequest, MailService};
use mailer_models::attachment::Attachment;
use mailer_templates_contracts::TemplateContext;
use mailer_utils::Apply;

use crate::environment;

#[derive(Debug, Args)]
pub struct SendCommand {
    /// Receiver address
    #[arg(long)]
    to: String,
    /// Receiver display name
    #[arg(long)]
    to_name: Option<String>,
    /// Sender address, defaults to the configured sender
    #[arg(long)]
    from: Option<String>,
    /// Sender display name
    #[arg(long)]
    from_name: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    /// Plain text body
    #[arg(long)]
    text: Option<String>,
    /// Html body
    #[arg(long)]
    html: Option<String>,
    /// Name of a template from the `mail.templates` configuration
    #[arg(long, short)]
    template: Option<String>,
    /// Template variable, may be given multiple times
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,
    /// Language of the template, defaults to `mail.default_lang`
    #[arg(long)]
    lang: Option<String>,
    /// Additional header, an empty value removes the header
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    headers: Vec<(String, String)>,
    /// File to attach, the content type is guessed from the file name
    #[arg(long = "attach", value_name = "PATH")]
    attachments: Vec<PathBuf>,
    #[arg(long)]
    bounce_token: Option<String>,
    /// Send text only
    #[arg(long)]
    no_html: bool,
}

impl SendCommand {
    /// Sends the mail and waits for the delivery task, the runtime would
    /// otherwise cancel it on exit.
    pub async fn invoke(self, config: Config) -> anyhow::Result<()> {
        let mail_service = environment::mail_service(&config.mail)?;

        let sent = mail_service.send(self.into_request()?)?.wait().await?;
        ensure!(sent.success, "Failed to send mail to {}", sent.receiver);
        println!(
            "Sent mail to {} ({})",
            sent.receiver,
            sent.message_id.unwrap_or_default()
        );

        Ok(())
    }

    fn into_request(self) -> anyhow::Result<MailRequest> {
        let attachments = self
            .attachments
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .with_context(|| format!("Invalid attachment file name {}", path.display()))?;
                let content = std::fs::read(path)
                    .with_context(|| format!("Failed to read attachment {}", path.display()))?;
                Ok(Attachment::guessed(name, content))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let context = self
            .vars
            .into_iter()
            .fold(TemplateContext::new(), |context, (key, value)| {
                context.with(key, value)
            });

        let mail = MailRequest::new()
            .to_email(self.to)
            .apply_map(self.to_name, MailRequest::to_name)
            .apply_map(self.from, MailRequest::from_email)
            .apply_map(self.from_name, MailRequest::from_name)
            .apply_map(self.subject, MailRequest::subject)
            .apply_map(self.text, MailRequest::text_content)
            .apply_map(self.html, MailRequest::html_content)
            .apply_map(self.template, |mail, template| {
                mail.use_template(template, context)
            })
            .apply_map(self.bounce_token, MailRequest::bounce_token)
            .lang(self.lang)
            .include_html_part(!self.no_html)
            .attachments(attachments)
            .with(|mail| mail.headers.extend(self.headers));

        Ok(mail)
    }
}

fn parse_key_value(s: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {s:?}"))?;
    ensure!(!key.is_empty(), "key must not be empty");
    Ok((key.into(), value.into()))
}
