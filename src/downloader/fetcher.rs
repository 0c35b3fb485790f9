//! Authenticated retrieval of a single download task

use crate::auth::TokenCache;
use crate::config::RetryPolicy;
use crate::downloader::ledger::{ErrorLedger, FailureRecord};
use crate::downloader::provisioner::DirectoryProvisioner;
use crate::errors::FetchError;
use crate::models::{DownloadTask, FetchOutcome};
use crate::retry::with_retry;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Downloads tasks into `{output_root}/{subfolder}/{filename}.pdf`.
///
/// Failures are written to the shared [`ErrorLedger`] and returned as
/// [`FetchOutcome::Failed`]; `fetch` never returns an error.
pub struct Fetcher {
    client: Client,
    output_root: PathBuf,
    tokens: Option<Arc<TokenCache>>,
    retry: RetryPolicy,
    provisioner: DirectoryProvisioner,
    ledger: Arc<ErrorLedger>,
}

impl Fetcher {
    pub fn new(client: Client, output_root: PathBuf, ledger: Arc<ErrorLedger>) -> Self {
        Self {
            client,
            output_root,
            tokens: None,
            retry: RetryPolicy::default(),
            provisioner: DirectoryProvisioner::new(),
            ledger,
        }
    }

    pub fn with_tokens(mut self, tokens: Option<Arc<TokenCache>>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn fetch(&self, task: &DownloadTask) -> FetchOutcome {
        match self.try_fetch(task).await {
            Ok(path) => {
                info!("Downloaded {}", path.display());
                FetchOutcome::Downloaded { path }
            }
            Err(e) => {
                let cause = e.to_string();
                warn!(
                    url = %task.url,
                    subfolder = %task.subfolder,
                    filename = %task.filename,
                    cause = %cause,
                    "Download failed"
                );
                self.ledger.record(FailureRecord::new(cause.clone(), task));
                FetchOutcome::Failed { cause }
            }
        }
    }

    async fn try_fetch(&self, task: &DownloadTask) -> Result<PathBuf, FetchError> {
        if !task.is_contained() {
            return Err(FetchError::UnsafePath {
                subfolder: task.subfolder.clone(),
                filename: task.filename.clone(),
            });
        }

        let directory = task.directory(&self.output_root);
        self.provisioner
            .ensure(&directory)
            .await
            .map_err(|source| FetchError::Directory {
                path: directory.clone(),
                source,
            })?;

        let destination = task.destination(&self.output_root);
        with_retry(&self.retry, || self.fetch_once(task, &directory, &destination)).await?;
        Ok(destination)
    }

    async fn fetch_once(
        &self,
        task: &DownloadTask,
        directory: &Path,
        destination: &Path,
    ) -> Result<(), FetchError> {
        let token = match &self.tokens {
            Some(tokens) => Some(tokens.current().await?),
            None => None,
        };

        let mut response = self.send(task, token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let (Some(tokens), Some(stale)) = (&self.tokens, token.as_deref()) {
                let fresh = tokens.refresh(stale).await?;
                response = self.send(task, Some(&fresh)).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: task.url.clone(),
            });
        }

        write_body(response, directory, destination).await
    }

    async fn send(&self, task: &DownloadTask, token: Option<&str>) -> Result<Response, FetchError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = token {
            params.push(("login_token", token));
        }
        if let Some(matter) = task.client_matter.as_deref() {
            params.push(("client_matter", matter));
        }

        debug!(url = %task.url, "Requesting document");
        let mut request = self.client.get(&task.url);
        if !params.is_empty() {
            request = request.query(&params);
        }
        // the query carries the login token, keep it out of error messages
        request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url()))
    }
}

/// Stream the body into a temp file in `directory`, then move it over `destination`.
///
/// The temp file is deleted on drop, so an interrupted body never leaves a
/// partial `.pdf` behind and an earlier complete download stays intact.
async fn write_body(response: Response, directory: &Path, destination: &Path) -> Result<(), FetchError> {
    let write_error = |source: std::io::Error| FetchError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let partial = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".part")
        .tempfile_in(directory)
        .map_err(write_error)?;
    let mut file = tokio::fs::File::from_std(partial.as_file().try_clone().map_err(write_error)?);

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Network(e.without_url()))?;
        file.write_all(&chunk).await.map_err(write_error)?;
    }
    file.flush().await.map_err(write_error)?;
    drop(file);

    partial
        .persist(destination)
        .map_err(|e| write_error(e.error))?;
    Ok(())
}
