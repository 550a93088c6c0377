//! Content store for files referenced by name, such as campaign attachments.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Use `root` as the store, creating it if needed.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Write `bytes` under the sanitized form of `filename`, replacing any
    /// file of that name. Returns the stored name, or `None` when nothing
    /// usable is left of the name after sanitizing.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<Option<String>> {
        let Some(name) = sanitize_filename(filename) else {
            return Ok(None);
        };
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(file = %name, bytes = bytes.len(), "Stored upload");
        Ok(Some(name))
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Reduce an uploaded filename to a safe single path component: directory
/// parts dropped, whitespace runs joined with `_`, and everything outside
/// `[A-Za-z0-9_.-]` removed. Leading and trailing `.` and `_` are stripped.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let flattened = filename.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_filename("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(
            sanitize_filename("Q3-results_v2.xlsx").as_deref(),
            Some("Q3-results_v2.xlsx")
        );
    }

    #[test]
    fn sanitize_flattens_paths_and_whitespace() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("etc_passwd")
        );
        assert_eq!(
            sanitize_filename("my  price list.pdf").as_deref(),
            Some("my_price_list.pdf")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\file.txt").as_deref(),
            Some("C_Users_me_file.txt")
        );
    }

    #[test]
    fn sanitize_drops_non_ascii_and_empty_results() {
        assert_eq!(sanitize_filename("résumé.pdf").as_deref(), Some("rsum.pdf"));
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[tokio::test]
    async fn save_writes_under_sanitized_name() {
        let root = std::env::temp_dir().join(format!("bulkmail-uploads-{}", uuid::Uuid::new_v4()));
        let uploads = UploadDir::create(&root).await.unwrap();

        let name = uploads
            .save("../flyer final.pdf", b"%PDF")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "flyer_final.pdf");
        assert_eq!(tokio::fs::read(uploads.path_for(&name)).await.unwrap(), b"%PDF");

        assert_eq!(uploads.save("///", b"x").await.unwrap(), None);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
