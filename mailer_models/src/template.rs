use std::collections::BTreeMap;

use serde::Deserialize;

/// Definition of a mail template as found in the `mail.templates` section of
/// the configuration.
///
/// `subject` and the attachments' `file_name` are template sources, `text`,
/// `html` and the attachments' `template` are names of registered templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MailTemplate {
    pub subject: Option<String>,
    pub text: String,
    pub html: Option<String>,
    #[serde(default)]
    pub localized: BTreeMap<String, LocalizedMailTemplate>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub attachments: BTreeMap<String, AttachmentTemplate>,
}

/// Language specific overrides of a [`MailTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocalizedMailTemplate {
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AttachmentTemplate {
    pub template: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub alternative: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Used if a template does not define a subject, so the subject has to be
/// passed in the template context.
pub const DEFAULT_SUBJECT: &str = "{{ subject }}";

impl MailTemplate {
    fn localized(&self, lang: &str) -> Option<&LocalizedMailTemplate> {
        self.localized.get(lang)
    }

    pub fn subject_for(&self, lang: &str) -> &str {
        self.localized(lang)
            .and_then(|l| l.subject.as_deref())
            .or(self.subject.as_deref())
            .unwrap_or(DEFAULT_SUBJECT)
    }

    pub fn text_for(&self, lang: &str) -> &str {
        self.localized(lang)
            .and_then(|l| l.text.as_deref())
            .unwrap_or(&self.text)
    }

    /// Returns `None` if the template has no html part at all. A localized
    /// html template alone does not enable the html part.
    pub fn html_for(&self, lang: &str) -> Option<&str> {
        let html = self.html.as_deref()?;
        Some(
            self.localized(lang)
                .and_then(|l| l.html.as_deref())
                .unwrap_or(html),
        )
    }
}

impl AttachmentTemplate {
    /// Derives a file name from an attachment id by turning the last `-` into
    /// a `.`, so `report-pdf` becomes `report.pdf`.
    pub fn file_name_from_id(id: &str) -> String {
        match id.rsplit_once('-') {
            Some((name, extension)) => format!("{name}.{extension}"),
            None => id.into(),
        }
    }
}
