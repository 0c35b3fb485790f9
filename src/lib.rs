//! docket-bulk: bulk retrieval of docket documents and exhibits
//!
//! Record files (one docket report per file) are turned into download tasks by
//! the [`extractor`], then fetched concurrently by the [`downloader`] into one
//! folder per record. Failed tasks are collected into a CSV error report.

pub mod auth;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod extractor;
pub mod models;
pub mod retry;
pub mod sanitize;

pub use config::Config;
pub use downloader::{download_documents, Scheduler};
pub use errors::{AuthError, BulkError, FetchError};
pub use extractor::{extract, LinkExtractor};
pub use models::{DownloadTask, FetchOutcome, RunSummary};
pub use sanitize::sanitize;
