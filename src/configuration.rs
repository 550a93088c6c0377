use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Hard ceiling on recipients processed by one activation.
pub const TOTAL_LIMIT: usize = 4000;
/// Hard ceiling on recipients assigned to one sender account per activation.
pub const LIMIT_PER_ACCOUNT: usize = 400;
pub const MAX_SENDER_ACCOUNTS: usize = 10;

pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

const DEFAULT_DATABASE_URL: &str = "sqlite://bulkmail.db";
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_SESSION_IDLE_MINUTES: i64 = 12 * 60;

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub bind_addr: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub max_upload_bytes: usize,
    /// Sessions idle longer than this are dropped with their sender pool and
    /// campaign.
    pub session_idle_minutes: i64,
    /// Mark the session cookie `Secure`. Off by default since the console is
    /// usually reached over plain HTTP on a LAN.
    pub session_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let smtp_port = match env::var("SMTP_PORT") {
            Ok(v) => v
                .parse()
                .context("SMTP_PORT must be a valid port number")?,
            Err(_) => DEFAULT_SMTP_PORT,
        };
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v
                .parse()
                .context("MAX_UPLOAD_BYTES must be a number of bytes")?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let session_idle_minutes = match env::var("SESSION_IDLE_MINUTES") {
            Ok(v) => v
                .parse()
                .context("SESSION_IDLE_MINUTES must be a number of minutes")?,
            Err(_) => DEFAULT_SESSION_IDLE_MINUTES,
        };

        Ok(Self {
            database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            smtp_host: env_or("SMTP_HOST", DEFAULT_SMTP_HOST),
            smtp_port,
            max_upload_bytes,
            session_idle_minutes,
            session_secure: env_or("SESSION_SECURE", "false").eq_ignore_ascii_case("true"),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
