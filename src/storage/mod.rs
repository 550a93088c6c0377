use crate::types::{Recipient, RecipientStats};
use anyhow::Result;
use chrono::{DateTime, Utc};

pub mod sqlite;
pub use sqlite::SqliteStorage;

/// Outcome of inserting one batch of addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

// ============================================================================
// Storage trait
// ============================================================================

/// Durable recipient store. Addresses are unique by exact string match.
#[allow(async_fn_in_trait)]
pub trait Storage: Send + Sync {
    /// Insert every address not already present, in a single transaction.
    /// An address repeated within `emails` counts as a duplicate after its
    /// first occurrence.
    async fn insert_recipients(&self, emails: &[String]) -> Result<InsertOutcome>;

    /// Pending recipients in insertion order, at most `limit` of them.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Recipient>>;

    /// Move a recipient to the sent state. Returns `false` if it was already
    /// sent (or does not exist); the stored `sent_at` is left untouched then.
    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool>;

    async fn stats(&self, since: DateTime<Utc>) -> Result<RecipientStats>;
}

// ============================================================================
// Test utilities: InMemoryStorage for in-crate tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use anyhow::bail;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct InMemoryStorage {
        pub recipients: Mutex<Vec<Recipient>>,
        /// Addresses whose `mark_sent` fails, as if the database went away
        /// mid-activation.
        unrecordable: HashSet<String>,
    }

    impl InMemoryStorage {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_pending(self, count: usize) -> Self {
            let emails: Vec<String> = (0..count)
                .map(|i| format!("user{}@example.com", i))
                .collect();
            self.push_all(&emails);
            self
        }

        pub(crate) fn with_emails(self, emails: &[&str]) -> Self {
            let emails: Vec<String> = emails.iter().map(|e| e.to_string()).collect();
            self.push_all(&emails);
            self
        }

        pub(crate) fn failing_mark_sent_for(mut self, emails: &[&str]) -> Self {
            self.unrecordable = emails.iter().map(|e| e.to_string()).collect();
            self
        }

        fn push_all(&self, emails: &[String]) -> InsertOutcome {
            let mut recipients = self.recipients.lock().unwrap();
            let mut outcome = InsertOutcome::default();
            for email in emails {
                if recipients.iter().any(|r| &r.email == email) {
                    outcome.duplicates += 1;
                    continue;
                }
                let id = recipients.len() as i64 + 1;
                recipients.push(Recipient {
                    id,
                    email: email.clone(),
                    uploaded_at: Utc::now(),
                    is_sent: false,
                    sent_at: None,
                });
                outcome.inserted += 1;
            }
            outcome
        }

        pub(crate) fn get(&self, email: &str) -> Option<Recipient> {
            self.recipients
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.email == email)
                .cloned()
        }

        pub(crate) fn count(&self) -> usize {
            self.recipients.lock().unwrap().len()
        }

        pub(crate) fn sent_count(&self) -> usize {
            self.recipients
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.is_sent)
                .count()
        }

        pub(crate) fn pending_count(&self) -> usize {
            self.count() - self.sent_count()
        }
    }

    impl Storage for InMemoryStorage {
        async fn insert_recipients(&self, emails: &[String]) -> Result<InsertOutcome> {
            Ok(self.push_all(emails))
        }

        async fn fetch_pending(&self, limit: usize) -> Result<Vec<Recipient>> {
            Ok(self
                .recipients
                .lock()
                .unwrap()
                .iter()
                .filter(|r| !r.is_sent)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool> {
            let mut recipients = self.recipients.lock().unwrap();
            if let Some(r) = recipients.iter().find(|r| r.id == id) {
                if self.unrecordable.contains(&r.email) {
                    bail!("database is locked");
                }
            }
            match recipients.iter_mut().find(|r| r.id == id && !r.is_sent) {
                Some(r) => {
                    r.is_sent = true;
                    r.sent_at = Some(sent_at);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn stats(&self, since: DateTime<Utc>) -> Result<RecipientStats> {
            let recipients = self.recipients.lock().unwrap();
            let total = recipients.len() as u64;
            let sent = recipients.iter().filter(|r| r.is_sent).count() as u64;
            let sent_since = recipients
                .iter()
                .filter(|r| r.sent_at.is_some_and(|at| at >= since))
                .count() as u64;
            Ok(RecipientStats {
                total,
                sent,
                pending: total - sent,
                sent_since,
            })
        }
    }
}
