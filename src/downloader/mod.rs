//! Concurrent bulk fetching of extracted download tasks
//!
//! The [`Scheduler`] fans tasks out to a [`Fetcher`], which provisions the
//! per-record directory, downloads with a shared login token and records
//! failures in the run's [`ErrorLedger`].

pub mod fetcher;
pub mod ledger;
pub mod provisioner;
pub mod scheduler;

pub use fetcher::Fetcher;
pub use ledger::{ErrorLedger, FailureRecord};
pub use provisioner::DirectoryProvisioner;
pub use scheduler::{LogProgress, NoProgress, ProgressObserver, Scheduler};

use crate::config::Config;
use crate::errors::BulkError;
use crate::extractor::LinkExtractor;
use crate::models::RunSummary;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Extract every link under `config.input_dir` and download them all.
///
/// Cancelling `cancel` stops dispatch of further tasks; the run still ends
/// with a summary and an error report.
pub async fn download_documents(
    config: &Config,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
) -> Result<RunSummary, BulkError> {
    info!("Reading records from {}", config.input_dir.display());
    let tasks = LinkExtractor::new(&config.record_extension)
        .with_client_matter(config.client_matter.clone())
        .extract(&config.input_dir)?;

    let client = config.http_client().map_err(BulkError::HttpClient)?;
    Scheduler::new(config.clone())
        .with_authenticator(config.authenticator(&client))
        .with_observer(observer)
        .with_cancellation(cancel)
        .run(tasks)
        .await
}
