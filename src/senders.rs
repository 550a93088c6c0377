//! Session-scoped pool of sender credentials.

use crate::configuration::MAX_SENDER_ACCOUNTS;
use crate::validation::is_plausible_email;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Operator input rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Max {} sender accounts allowed", MAX_SENDER_ACCOUNTS)]
    PoolFull,
    #[error("Invalid email address")]
    InvalidAddress(String),
    #[error("Sender account already added")]
    DuplicateAccount(String),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderAccount {
    pub email: String,
    pub password: String,
}

impl SenderAccount {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Keeps credentials out of logs.
impl fmt::Debug for SenderAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderAccount")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Ordered set of sender accounts, unique by address, at most
/// [`MAX_SENDER_ACCOUNTS`] long.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderPool {
    accounts: Vec<SenderAccount>,
}

impl SenderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an account. Both fields are trimmed first.
    pub fn add(&mut self, email: &str, password: &str) -> Result<(), ValidationError> {
        if self.accounts.len() >= MAX_SENDER_ACCOUNTS {
            return Err(ValidationError::PoolFull);
        }

        let email = email.trim();
        if !is_plausible_email(email) {
            return Err(ValidationError::InvalidAddress(email.to_string()));
        }
        if self.accounts.iter().any(|a| a.email == email) {
            return Err(ValidationError::DuplicateAccount(email.to_string()));
        }

        self.accounts
            .push(SenderAccount::new(email, password.trim()));
        Ok(())
    }

    /// Remove the account with this address. Returns whether one was removed;
    /// removing an unknown address is not an error.
    pub fn remove(&mut self, email: &str) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.email != email);
        self.accounts.len() != before
    }

    pub fn list(&self) -> &[SenderAccount] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_keeps_insertion_order_and_trims() {
        let mut pool = SenderPool::new();
        pool.add("  b@example.com ", " secret ").unwrap();
        pool.add("a@example.com", "pw").unwrap();

        let emails: Vec<&str> = pool.list().iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["b@example.com", "a@example.com"]);
        assert_eq!(pool.list()[0].password, "secret");
    }

    #[test]
    fn add_rejects_invalid_address() {
        let mut pool = SenderPool::new();
        assert_eq!(
            pool.add("not-an-email", "pw"),
            Err(ValidationError::InvalidAddress("not-an-email".to_string()))
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn add_rejects_duplicate() {
        let mut pool = SenderPool::new();
        pool.add("a@example.com", "pw").unwrap();
        assert_eq!(
            pool.add("a@example.com", "other"),
            Err(ValidationError::DuplicateAccount("a@example.com".to_string()))
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.list()[0].password, "pw");
    }

    #[test]
    fn add_rejects_eleventh_account() {
        let mut pool = SenderPool::new();
        for i in 0..MAX_SENDER_ACCOUNTS {
            pool.add(&format!("s{}@example.com", i), "pw").unwrap();
        }
        assert_eq!(
            pool.add("extra@example.com", "pw"),
            Err(ValidationError::PoolFull)
        );
        assert_eq!(pool.len(), MAX_SENDER_ACCOUNTS);
    }

    #[test]
    fn full_pool_is_reported_before_bad_address() {
        let mut pool = SenderPool::new();
        for i in 0..MAX_SENDER_ACCOUNTS {
            pool.add(&format!("s{}@example.com", i), "pw").unwrap();
        }
        assert_eq!(pool.add("garbage", "pw"), Err(ValidationError::PoolFull));
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut pool = SenderPool::new();
        pool.add("a@example.com", "pw").unwrap();
        assert!(!pool.remove("missing@example.com"));
        assert!(pool.remove("a@example.com"));
        assert!(pool.is_empty());
    }

    #[test]
    fn debug_output_redacts_password() {
        let account = SenderAccount::new("a@example.com", "hunter2");
        let rendered = format!("{:?}", account);
        assert!(rendered.contains("a@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn error_messages_match_operator_wording() {
        assert_eq!(
            ValidationError::PoolFull.to_string(),
            "Max 10 sender accounts allowed"
        );
        assert_eq!(
            ValidationError::InvalidAddress("x".into()).to_string(),
            "Invalid email address"
        );
        assert_eq!(
            ValidationError::DuplicateAccount("x".into()).to_string(),
            "Sender account already added"
        );
    }
}
