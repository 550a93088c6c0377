use chrono::{DateTime, Utc};

/// A stored target address with its send state.
///
/// `is_sent` only ever moves from `false` to `true`; `sent_at` is written in
/// the same update and never again.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Recipient {
    pub id: i64,
    pub email: String,
    pub uploaded_at: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Counters shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientStats {
    pub total: u64,
    pub sent: u64,
    pub pending: u64,
    pub sent_since: u64,
}

/// A file received from an upload form or read from disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field the file arrived in.
    pub field: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(field: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            bytes,
        }
    }
}
