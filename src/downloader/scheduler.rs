//! Bounded concurrent execution of a batch of download tasks

use crate::auth::{Authenticator, TokenCache};
use crate::config::Config;
use crate::downloader::fetcher::Fetcher;
use crate::downloader::ledger::ErrorLedger;
use crate::errors::BulkError;
use crate::models::{DownloadTask, RunSummary};
use futures::{future, stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Receives live progress while a run is in flight
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Ignores progress
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Logs progress at roughly every tenth of the batch
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        let step = (total / 10).max(1);
        if completed % step == 0 || completed == total {
            info!("Progress: {}/{} documents", completed, total);
        }
    }
}

/// Runs batches of download tasks with the settings of one [`Config`]
pub struct Scheduler {
    config: Config,
    authenticator: Option<Arc<dyn Authenticator>>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            authenticator: None,
            observer: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_authenticator(mut self, authenticator: Option<Arc<dyn Authenticator>>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops dispatch of further tasks when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch every task with at most `config.concurrency` in flight.
    ///
    /// Individual task failures end up in the error report; only an unusable
    /// output or report directory, a failed initial login or an unbuildable
    /// HTTP client abort the run.
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> Result<RunSummary, BulkError> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_inner(run_id, tasks).instrument(span).await
    }

    async fn run_inner(&self, run_id: uuid::Uuid, tasks: Vec<DownloadTask>) -> Result<RunSummary, BulkError> {
        let start = Instant::now();
        let total = tasks.len();
        let concurrency = self.config.concurrency.max(1);

        ensure_writable(&self.config.output_dir)?;
        std::fs::create_dir_all(&self.config.report_dir).map_err(|source| BulkError::OutputUnwritable {
            path: self.config.report_dir.clone(),
            source,
        })?;

        let tokens = match &self.authenticator {
            Some(authenticator) => {
                let tokens = Arc::new(TokenCache::new(authenticator.clone()));
                tokens.current().await?;
                info!("Authenticated with the docket API");
                Some(tokens)
            }
            None => None,
        };

        let client = self.config.http_client().map_err(BulkError::HttpClient)?;

        let ledger = Arc::new(ErrorLedger::new());
        let fetcher = Fetcher::new(client, self.config.output_dir.clone(), ledger.clone())
            .with_tokens(tokens)
            .with_retry_policy(self.config.retry.clone());

        info!("Downloading {} documents with {} workers", total, concurrency);

        let mut succeeded = 0;
        let mut failed = 0;
        let cancel = self.cancel.clone();
        let fetcher = &fetcher;

        let mut outcomes = stream::iter(tasks)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|task| async move { fetcher.fetch(&task).await })
            .buffer_unordered(concurrency);

        while let Some(outcome) = outcomes.next().await {
            if outcome.is_success() {
                succeeded += 1;
            } else {
                failed += 1;
            }
            self.observer.on_progress(succeeded + failed, total);
        }

        let elapsed = start.elapsed();
        let cancelled = self.cancel.is_cancelled();
        let not_started = total - succeeded - failed;
        if cancelled {
            warn!("Run cancelled, {} documents were not attempted", not_started);
        }

        let report_path = flush_report(ledger, self.config.report_dir.clone()).await?;

        info!(
            succeeded,
            failed,
            "Finished downloading documents in {} seconds",
            elapsed.as_secs()
        );

        Ok(RunSummary {
            run_id,
            total,
            succeeded,
            failed,
            not_started,
            cancelled,
            elapsed,
            report_path,
        })
    }
}

/// Write the CSV report on the blocking pool
async fn flush_report(ledger: Arc<ErrorLedger>, report_dir: PathBuf) -> Result<PathBuf, BulkError> {
    let dir = report_dir.clone();
    tokio::task::spawn_blocking(move || ledger.flush(&dir, chrono::Local::now()))
        .await
        .map_err(|e| BulkError::ReportUnwritable {
            path: report_dir,
            source: std::io::Error::new(std::io::ErrorKind::Other, e).into(),
        })?
}

/// Create the output root and prove a file can be written there
fn ensure_writable(dir: &Path) -> Result<(), BulkError> {
    let unwritable = |source| BulkError::OutputUnwritable {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(unwritable)?;
    tempfile::tempfile_in(dir).map_err(unwritable)?;
    Ok(())
}
