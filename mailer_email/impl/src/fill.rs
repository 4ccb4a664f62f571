use mailer_email_contracts::{MailError, MailRequest, TemplateRef};
use mailer_models::{
    attachment::{guess_mime_type, Attachment},
    template::AttachmentTemplate,
};
use mailer_templates_contracts::{TemplateContext, TemplateService};
use tracing::warn;

use crate::MailServiceConfig;

/// Replaces subject, text, html, headers and attachments of the mail with
/// the rendered template it references. Mails without a template are
/// returned unchanged.
pub(crate) fn fill_template(
    templates: &impl TemplateService,
    config: &MailServiceConfig,
    mut mail: MailRequest,
) -> Result<MailRequest, MailError> {
    let Some(TemplateRef { name, mut context }) = mail.template.take() else {
        return Ok(mail);
    };
    let template = config
        .templates
        .get(&name)
        .ok_or_else(|| MailError::UnknownTemplate(name.clone()))?;

    let lang = mail
        .lang
        .clone()
        .unwrap_or_else(|| config.default_lang.clone());
    context.insert("template", name.as_str());
    context.insert("lang", lang.as_str());

    let subject = match templates.render_str(template.subject_for(&lang), &context) {
        Ok(subject) => subject,
        Err(err) => return Err(prepare_error(&mail, err)),
    };
    mail.subject = Some(subject);

    let text = match templates.render(template.text_for(&lang), &context) {
        Ok(text) => text,
        Err(err) => return Err(prepare_error(&mail, err)),
    };
    mail.text = Some(text);

    mail.html = match template.html_for(&lang) {
        Some(html) if mail.include_html_part => templates
            .render(html, &context)
            .inspect_err(|err| {
                warn!(template = %name, %lang, "failed to render html part, sending text only: {err:#}")
            })
            .ok(),
        _ => None,
    };

    mail.headers.extend(template.headers.clone());

    for (id, attachment) in &template.attachments {
        match render_attachment(templates, id, attachment, &context) {
            Ok(attachment) => mail.attachments.push(attachment),
            Err(err) => {
                warn!(template = %name, attachment = %id, "failed to render attachment, skipping it: {err:#}")
            }
        }
    }

    Ok(mail)
}

fn render_attachment(
    templates: &impl TemplateService,
    id: &str,
    attachment: &AttachmentTemplate,
    context: &TemplateContext,
) -> anyhow::Result<Attachment> {
    let content = templates.render(&attachment.template, context)?;
    let name = match &attachment.file_name {
        Some(file_name) => templates.render_str(file_name, context)?,
        None => AttachmentTemplate::file_name_from_id(id),
    };
    let mime_type = attachment
        .content_type
        .clone()
        .unwrap_or_else(|| guess_mime_type(&name));

    Ok(Attachment {
        name,
        mime_type,
        content: content.into_bytes(),
        headers: attachment.headers.clone(),
        alternative: attachment.alternative,
    })
}

fn prepare_error(mail: &MailRequest, source: anyhow::Error) -> MailError {
    MailError::Prepare {
        receiver: mail.receiver_display(),
        sender: mail.sender_display(),
        subject: mail.subject.clone().unwrap_or_default(),
        source,
    }
}
