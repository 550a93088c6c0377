//! Spreadsheet ingestion into the recipient store.

use crate::configuration::ALLOWED_EXTENSIONS;
use crate::spreadsheet;
use crate::storage::Storage;
use crate::types::UploadedFile;
use crate::validation::is_plausible_email;
use anyhow::{Context, Result};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A file that was skipped; the rest of the batch still runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionFileError {
    #[error("Unsupported file type for {filename} (expected .xlsx or .xls)")]
    UnsupportedExtension { filename: String },
    #[error("No email column found in file {filename}")]
    NoEmailColumn { filename: String },
    #[error("Could not read spreadsheet {filename}: {reason}")]
    Unreadable { filename: String, reason: String },
}

/// Aggregate counters for one upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Non-empty cells read from address columns.
    pub processed: usize,
    /// Cells that passed the address shape check.
    pub valid: usize,
    /// Valid addresses already stored (or repeated within the batch).
    pub duplicates: usize,
    pub inserted: usize,
    pub file_errors: Vec<IngestionFileError>,
}

pub fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Ingest every file in turn. Per-file problems are recorded in the report;
/// only storage failures abort the batch.
pub async fn ingest_files<S: Storage>(
    storage: &Arc<S>,
    files: Vec<UploadedFile>,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for file in files {
        let filename = file.filename.clone();
        match ingest_file(storage, file, &mut report).await? {
            Ok(()) => {}
            Err(e) => {
                warn!(file = %filename, error = %e, "Skipping file");
                report.file_errors.push(e);
            }
        }
    }

    info!(
        processed = report.processed,
        valid = report.valid,
        duplicates = report.duplicates,
        inserted = report.inserted,
        skipped_files = report.file_errors.len(),
        "Ingestion finished"
    );
    Ok(report)
}

async fn ingest_file<S: Storage>(
    storage: &Arc<S>,
    file: UploadedFile,
    report: &mut IngestReport,
) -> Result<Result<(), IngestionFileError>> {
    let UploadedFile {
        filename, bytes, ..
    } = file;

    if !has_allowed_extension(&filename) {
        return Ok(Err(IngestionFileError::UnsupportedExtension { filename }));
    }

    let parsed = tokio::task::spawn_blocking(move || spreadsheet::read_email_column(bytes))
        .await
        .context("Spreadsheet reader task failed")?;
    let cells = match parsed {
        Ok(Some(cells)) => cells,
        Ok(None) => return Ok(Err(IngestionFileError::NoEmailColumn { filename })),
        Err(e) => {
            return Ok(Err(IngestionFileError::Unreadable {
                filename,
                reason: format!("{:#}", e),
            }));
        }
    };

    let candidates: Vec<String> = cells
        .iter()
        .filter(|c| is_plausible_email(c))
        .cloned()
        .collect();
    let outcome = storage.insert_recipients(&candidates).await?;

    report.processed += cells.len();
    report.valid += candidates.len();
    report.duplicates += outcome.duplicates;
    report.inserted += outcome.inserted;

    info!(
        file = %filename,
        processed = cells.len(),
        valid = candidates.len(),
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        "Ingested file"
    );
    Ok(Ok(()))
}
