use anyhow::{Context, Result};
use bulkmail::configuration::Config;
use bulkmail::ingest;
use bulkmail::storage::SqliteStorage;
use bulkmail::types::UploadedFile;
use std::env;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("Usage: cargo run --bin import-recipients <file.xlsx> [more files...]");
        eprintln!(
            "Example: DATABASE_URL=sqlite://bulkmail.db cargo run --bin import-recipients leads.xlsx"
        );
        std::process::exit(1);
    }

    let config = Config::from_env()?;
    let storage = Arc::new(SqliteStorage::connect(&config.database_url).await?);

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        files.push(UploadedFile::new("files", filename, bytes));
    }

    println!("Importing {} file(s) into {}", files.len(), config.database_url);
    let report = ingest::ingest_files(&storage, files).await?;

    println!("  Processed:  {}", report.processed);
    println!("  Valid:      {}", report.valid);
    println!("  Duplicates: {}", report.duplicates);
    println!("  Inserted:   {}", report.inserted);
    for e in &report.file_errors {
        println!("  Skipped:    {}", e);
    }

    Ok(())
}
