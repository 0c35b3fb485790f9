//! Error types for bulk runs

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole run. Nothing is persisted when one of these is returned.
#[derive(Error, Debug)]
pub enum BulkError {
    #[error("Input directory does not exist: {}", .0.display())]
    InputDirectoryMissing(PathBuf),

    #[error("Failed to read record {}: {source}", .path.display())]
    RecordRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record {}: {source}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output directory {} is not writable: {source}", .path.display())]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write error report {}: {source}", .path.display())]
    ReportUnwritable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Errors from the authentication collaborator
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Login rejected: {0}")]
    Rejected(String),
}

/// Per-task failures. These are recorded in the error ledger, never propagated out of a run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for url: {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Refusing to write outside the output directory: {subfolder}/{filename}")]
    UnsafePath { subfolder: String, filename: String },
}
