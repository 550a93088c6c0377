use super::{InsertOutcome, Storage};
use crate::types::{Recipient, RecipientStats};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const CREATE_RECIPIENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS recipients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    uploaded_at TEXT NOT NULL,
    is_sent BOOLEAN NOT NULL DEFAULT 0,
    sent_at TEXT
)
"#;

// ============================================================================
// SqliteStorage: sqlx-backed Storage implementation
// ============================================================================

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect to `database_url`, creating the database file and the
    /// recipients table if they do not exist yet.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open database")?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database. The pool is pinned to one connection
    /// since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_RECIPIENTS_TABLE)
            .execute(&pool)
            .await
            .context("Failed to create recipients table")?;
        Ok(Self { pool })
    }
}

impl Storage for SqliteStorage {
    async fn insert_recipients(&self, emails: &[String]) -> Result<InsertOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let now = Utc::now();
        let mut outcome = InsertOutcome::default();

        for email in emails {
            let result = sqlx::query(
                "INSERT INTO recipients (email, uploaded_at) VALUES (?1, ?2) \
                 ON CONFLICT(email) DO NOTHING",
            )
            .bind(email.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert recipient {}", email))?;

            if result.rows_affected() == 1 {
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        tx.commit().await.context("Failed to commit recipients")?;
        Ok(outcome)
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Recipient>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query_as::<_, Recipient>(
            "SELECT id, email, uploaded_at, is_sent, sent_at FROM recipients \
             WHERE is_sent = 0 ORDER BY id LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending recipients")
    }

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE recipients SET is_sent = 1, sent_at = ?1 WHERE id = ?2 AND is_sent = 0",
        )
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to mark recipient {} as sent", id))?;

        Ok(result.rows_affected() == 1)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<RecipientStats> {
        let (total, sent, sent_since): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN is_sent THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN sent_at >= ?1 THEN 1 ELSE 0 END), 0) \
             FROM recipients",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count recipients")?;

        let total = total.max(0) as u64;
        let sent = sent.max(0) as u64;
        Ok(RecipientStats {
            total,
            sent,
            pending: total.saturating_sub(sent),
            sent_since: sent_since.max(0) as u64,
        })
    }
}
