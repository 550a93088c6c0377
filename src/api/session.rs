use crate::campaign::Campaign;
use crate::senders::SenderPool;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const STATE_KEY: &str = "operator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashLevel {
    Success,
    Warning,
    Danger,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// One-shot status message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Per-operator state kept in the session store. Lost when the process exits
/// or the session expires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorState {
    pub senders: SenderPool,
    pub campaign: Campaign,
    flashes: Vec<Flash>,
}

impl OperatorState {
    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.flashes.push(Flash {
            level,
            message: message.into(),
        });
    }
}

/// Typed view over a `tower_sessions::Session`.
///
/// Reads never write back, so a visitor who only browses leaves nothing in
/// the store and receives no cookie.
#[derive(Clone)]
pub struct OperatorSession {
    inner: tower_sessions::Session,
}

impl OperatorSession {
    pub fn new(inner: tower_sessions::Session) -> Self {
        Self { inner }
    }

    pub async fn load(&self) -> Result<OperatorState> {
        let state = self
            .inner
            .get::<OperatorState>(STATE_KEY)
            .await
            .context("Failed to read session")?;
        Ok(state.unwrap_or_default())
    }

    /// Load, apply `f`, and write the result back.
    pub async fn update<R>(&self, f: impl FnOnce(&mut OperatorState) -> R) -> Result<R> {
        let mut state = self.load().await?;
        let out = f(&mut state);
        self.inner
            .insert(STATE_KEY, &state)
            .await
            .context("Failed to write session")?;
        Ok(out)
    }

    pub async fn flash(&self, level: FlashLevel, message: impl Into<String>) -> Result<()> {
        self.update(|s| s.flash(level, message)).await
    }

    /// Pending flashes, cleared from the session. Writes only when there was
    /// something to clear.
    pub async fn take_flashes(&self) -> Result<Vec<Flash>> {
        let mut state = self.load().await?;
        if state.flashes.is_empty() {
            return Ok(Vec::new());
        }
        let flashes = std::mem::take(&mut state.flashes);
        self.inner
            .insert(STATE_KEY, &state)
            .await
            .context("Failed to write session")?;
        Ok(flashes)
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::{is_blank, operator_session};
    use super::*;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let a = operator_session();
        let b = operator_session();

        a.update(|s| s.senders.add("a@example.com", "pw").unwrap())
            .await
            .unwrap();

        assert_eq!(a.load().await.unwrap().senders.len(), 1);
        assert_eq!(b.load().await.unwrap().senders.len(), 0);
    }

    #[tokio::test]
    async fn flashes_are_shown_once() {
        let session = operator_session();

        session.flash(FlashLevel::Success, "saved").await.unwrap();
        let first = session.take_flashes().await.unwrap();
        let second = session.take_flashes().await.unwrap();

        assert_eq!(
            first,
            vec![Flash {
                level: FlashLevel::Success,
                message: "saved".to_string()
            }]
        );
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn reading_leaves_session_empty() {
        let session = operator_session();

        let state = session.load().await.unwrap();
        let flashes = session.take_flashes().await.unwrap();

        assert!(state.senders.is_empty());
        assert!(flashes.is_empty());
        assert!(is_blank(&session).await);
    }
}
