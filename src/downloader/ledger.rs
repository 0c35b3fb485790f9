//! Error ledger: per-run record of failed downloads, persisted as CSV

use crate::errors::BulkError;
use crate::models::DownloadTask;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// One failed task. Created once, never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub cause: String,
    pub subfolder: String,
    pub filename: String,
    pub timestamp: DateTime<Local>,
}

impl FailureRecord {
    pub fn new(cause: impl Into<String>, task: &DownloadTask) -> Self {
        Self {
            cause: cause.into(),
            subfolder: task.subfolder.clone(),
            filename: task.filename.clone(),
            timestamp: Local::now(),
        }
    }
}

/// Thread-safe, append-only collection of failures for one run
#[derive(Debug, Default)]
pub struct ErrorLedger {
    records: Mutex<Vec<FailureRecord>>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, failure: FailureRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Report file name for a run that completed at `completed_at`
    pub fn report_file_name(completed_at: DateTime<Local>) -> String {
        format!("failed-downloads-{}.csv", completed_at.format("%Y%m%d-%H%M%S"))
    }

    /// Write every failure to a CSV report in `report_dir`; an empty ledger yields a header-only file.
    pub fn flush(&self, report_dir: &Path, completed_at: DateTime<Local>) -> Result<PathBuf, BulkError> {
        let path = report_dir.join(Self::report_file_name(completed_at));
        let records = self.records();

        let to_report_error = |source: csv::Error| BulkError::ReportUnwritable {
            path: path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(to_report_error)?;
        writer
            .write_record(["cause", "subfolder", "filename"])
            .map_err(to_report_error)?;
        for failure in &records {
            writer
                .write_record([&failure.cause, &failure.subfolder, &failure.filename])
                .map_err(to_report_error)?;
        }
        writer
            .flush()
            .map_err(|e| to_report_error(e.into()))?;

        info!(
            failures = records.len(),
            "Wrote error report to {}",
            path.display()
        );
        Ok(path)
    }
}
