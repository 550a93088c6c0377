pub mod api;
pub mod campaign;
pub mod configuration;
pub mod dispatcher;
pub mod ingest;
pub mod mailer;
pub mod senders;
pub mod spreadsheet;
pub mod storage;
pub mod types;
pub mod uploads;
pub mod validation;
