use crate::senders::SenderAccount;
use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// Mailer trait
// ============================================================================

/// Delivers one message as one sender. Implementations own every transport
/// concern; callers treat any error as a failed delivery for that recipient.
#[allow(async_fn_in_trait)]
pub trait Mailer: Send + Sync {
    async fn send_email(
        &self,
        sender: &SenderAccount,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<()>;
}

// ============================================================================
// SmtpMailer: authenticated SMTP submission over STARTTLS
// ============================================================================

pub struct SmtpMailer {
    host: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    async fn build_message(
        sender: &SenderAccount,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<Message> {
        let from: Mailbox = sender
            .email
            .parse()
            .with_context(|| format!("Invalid sender address {}", sender.email))?;
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address {}", recipient))?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
        if let Some(path) = attachment {
            match attachment_part(path).await? {
                Some(part) => parts = parts.singlepart(part),
                None => warn!(path = %path.display(), "Attachment missing, sending without it"),
            }
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(parts)
            .context("Failed to build message")
    }
}

/// `None` when `path` is not a regular file.
async fn attachment_part(path: &Path) -> Result<Option<SinglePart>> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Ok(None);
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let content_type = ContentType::parse("application/octet-stream")
        .context("Invalid attachment content type")?;

    Ok(Some(Attachment::new(filename).body(bytes, content_type)))
}

impl Mailer for SmtpMailer {
    async fn send_email(
        &self,
        sender: &SenderAccount,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<()> {
        let message = Self::build_message(sender, recipient, subject, body, attachment).await?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .with_context(|| format!("Failed to set up SMTP relay {}", self.host))?
            .port(self.port)
            .credentials(Credentials::new(
                sender.email.clone(),
                sender.password.clone(),
            ))
            .build();

        let response = transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send email to {}", recipient))?;

        info!(
            code = %response.code(),
            sender = %sender.email,
            recipient = %recipient,
            "Email sent"
        );

        Ok(())
    }
}

// ============================================================================
// Test utilities
// ============================================================================

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct SentEmail {
        pub sender: String,
        pub recipient: String,
        pub subject: String,
        pub body: String,
        pub attachment: Option<PathBuf>,
    }

    /// Records every delivery; fails for recipients listed in `failing`.
    #[derive(Default)]
    pub(crate) struct SpyMailer {
        sent: Mutex<Vec<SentEmail>>,
        failing: HashSet<String>,
    }

    impl SpyMailer {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn failing_for(recipients: &[&str]) -> Self {
            Self {
                sent: Mutex::default(),
                failing: recipients.iter().map(|r| r.to_string()).collect(),
            }
        }

        pub(crate) fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn email_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Mailer for SpyMailer {
        async fn send_email(
            &self,
            sender: &SenderAccount,
            recipient: &str,
            subject: &str,
            body: &str,
            attachment: Option<&Path>,
        ) -> Result<()> {
            if self.failing.contains(recipient) {
                anyhow::bail!("550 mailbox unavailable: {}", recipient);
            }
            self.sent.lock().unwrap().push(SentEmail {
                sender: sender.email.clone(),
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
                attachment: attachment.map(Path::to_path_buf),
            });
            Ok(())
        }
    }
}
