use std::collections::BTreeSet;

use anyhow::{bail, Context};
use mailer_config::{MailConfig, SmtpConfig};
use mailer_email_impl::{
    smtp::{SmtpSecurity, SmtpTransportConfig, SmtpTransportImpl, DEFAULT_TIMEOUT},
    MailServiceConfig, MailServiceImpl,
};
use mailer_templates_impl::TemplateServiceImpl;
use tracing::debug;

pub type Mail = MailServiceImpl<SmtpTransportImpl, TemplateServiceImpl>;

/// Builds the mail service from the `mail` section of the configuration.
///
/// Must be called from within a Tokio runtime.
pub fn mail_service(config: &MailConfig) -> anyhow::Result<Mail> {
    let transport = SmtpTransportImpl::new(smtp_transport_config(&config.smtp))
        .context("Failed to set up SMTP transport")?;
    let templates = template_service(config)?;
    check_templates(config, &templates)?;

    Ok(MailServiceImpl::new(
        transport,
        templates,
        mail_service_config(config),
    ))
}

pub fn template_service(config: &MailConfig) -> anyhow::Result<TemplateServiceImpl> {
    match &config.templates_path {
        Some(path) => TemplateServiceImpl::from_dir(path),
        None => {
            debug!("no templates path configured");
            TemplateServiceImpl::from_raw([])
        }
    }
}

/// Makes sure every template referenced in the configuration is available.
pub fn check_templates(
    config: &MailConfig,
    templates: &TemplateServiceImpl,
) -> anyhow::Result<()> {
    let available = templates.template_names().collect::<BTreeSet<_>>();
    let available = &available;

    let missing = config
        .templates
        .iter()
        .flat_map(|(name, template)| {
            let localized = template.localized.values().flat_map(|localized| {
                [localized.text.as_deref(), localized.html.as_deref()]
                    .into_iter()
                    .flatten()
            });
            [Some(template.text.as_str()), template.html.as_deref()]
                .into_iter()
                .flatten()
                .chain(localized)
                .chain(
                    template
                        .attachments
                        .values()
                        .map(|attachment| attachment.template.as_str()),
                )
                .filter(move |file| !available.contains(file))
                .map(move |file| format!("{file} (used by {name})"))
        })
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        bail!("Missing mail templates: {}", missing.join(", "));
    }

    Ok(())
}

pub fn smtp_transport_config(config: &SmtpConfig) -> SmtpTransportConfig {
    SmtpTransportConfig {
        host: config.host.clone(),
        port: config.port,
        user: config.user.clone(),
        password: config.password.clone(),
        security: match config.security {
            mailer_config::SmtpSecurity::None => SmtpSecurity::None,
            mailer_config::SmtpSecurity::StartTls => SmtpSecurity::StartTls,
            mailer_config::SmtpSecurity::Tls => SmtpSecurity::Tls,
        },
        timeout: config.timeout.map_or(DEFAULT_TIMEOUT, Into::into),
    }
}

pub fn mail_service_config(config: &MailConfig) -> MailServiceConfig {
    MailServiceConfig {
        sender: config.smtp.sender.clone(),
        sender_name: config.smtp.sender_name.clone(),
        use_sender_and_envelope_from: config.smtp.use_sender_and_envelope_from,
        mailer: config.mailer.clone(),
        default_lang: config.default_lang.clone(),
        max_concurrent_deliveries: config.max_concurrent_deliveries,
        templates: config.templates.clone(),
    }
}
