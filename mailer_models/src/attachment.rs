use std::collections::BTreeMap;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file attached to a mail.
///
/// Attachments marked as `alternative` are added as an alternative rendering
/// of the mail body (e.g. an iCalendar invitation next to the text and html
/// parts) instead of a regular `multipart/mixed` attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    /// Additional headers of the body part. An empty value removes the
    /// header of that name.
    pub headers: BTreeMap<String, String>,
    pub alternative: bool,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
            headers: BTreeMap::new(),
            alternative: false,
        }
    }

    /// Creates an attachment whose mime type is guessed from its file name.
    pub fn guessed(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mime_type = guess_mime_type(&name);
        Self::new(name, mime_type, content)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn as_alternative(mut self) -> Self {
        self.alternative = true;
        self
    }
}

/// Guesses the mime type of a file by its extension.
pub fn guess_mime_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .into()
}
