use serde::{Deserialize, Serialize};

/// Token in the body replaced by each recipient's address.
pub const EMAIL_PLACEHOLDER: &str = "{email}";

/// The message sent by an activation. One per session, replaced wholesale on
/// every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub subject: String,
    pub body: String,
    /// Stored name of an attachment in the upload directory.
    pub attachment: Option<String>,
}

impl Campaign {
    pub fn new(subject: &str, body: &str, attachment: Option<String>) -> Self {
        Self {
            subject: subject.trim().to_string(),
            body: body.trim().to_string(),
            attachment,
        }
    }

    /// Subject and body are both non-empty.
    pub fn is_ready(&self) -> bool {
        !self.subject.is_empty() && !self.body.is_empty()
    }

    pub fn render_body(&self, recipient: &str) -> String {
        self.body.replace(EMAIL_PLACEHOLDER, recipient)
    }
}
