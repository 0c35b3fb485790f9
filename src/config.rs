//! Run configuration for docket-bulk
//!
//! A `Config` is built once (defaults, then environment, then CLI flags) and
//! passed explicitly into the scheduler; nothing reads process-wide state mid-run.

use crate::auth::{Authenticator, LoginAuthenticator, StaticToken};
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LOGIN_URL: &str = "https://www.docketalarm.com/api/v1/login/";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the record files
    pub input_dir: PathBuf,
    /// Root directory; each record gets a subfolder here
    pub output_dir: PathBuf,
    /// Where failure reports are written
    pub report_dir: PathBuf,
    /// Record file extension, matched case-insensitively
    pub record_extension: String,
    /// Matter/billing code attached to every request
    pub client_matter: Option<String>,
    /// Maximum number of tasks in flight
    pub concurrency: usize,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
    pub auth: AuthConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Retry behaviour for transient network failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retry
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

/// Credentials for the docket API. All optional: with none set requests go out unauthenticated.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Pre-issued login token; takes precedence over username/password
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub login_url: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("login_url", &self.login_url)
            .finish()
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "docket-bulk/0.1.0".to_string(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: "./json-output".into(),
            output_dir: "./pdf-output".into(),
            report_dir: "./log".into(),
            record_extension: "json".to_string(),
            client_matter: None,
            concurrency: default_concurrency(),
            http: HttpConfig::default(),
            retry: RetryPolicy::default(),
            auth: AuthConfig {
                login_url: DEFAULT_LOGIN_URL.to_string(),
                ..AuthConfig::default()
            },
        }
    }
}

/// One worker per available core, falling back to 4
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let retry = RetryPolicy {
            max_retries: parse_env_var("DOCKET_BULK_MAX_RETRIES")?
                .unwrap_or(defaults.retry.max_retries),
            initial_delay: parse_env_var("DOCKET_BULK_RETRY_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.initial_delay),
            ..defaults.retry
        };

        let http = HttpConfig {
            timeout_seconds: parse_env_var("DOCKET_BULK_HTTP_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.timeout_seconds),
            user_agent: std::env::var("DOCKET_BULK_USER_AGENT")
                .unwrap_or(defaults.http.user_agent),
        };

        let auth = AuthConfig {
            token: std::env::var("DOCKET_BULK_LOGIN_TOKEN").ok(),
            username: std::env::var("DOCKET_BULK_USERNAME").ok(),
            password: std::env::var("DOCKET_BULK_PASSWORD").ok(),
            login_url: std::env::var("DOCKET_BULK_LOGIN_URL")
                .unwrap_or(defaults.auth.login_url),
        };

        Ok(Config {
            input_dir: env_path("DOCKET_BULK_INPUT_DIR").unwrap_or(defaults.input_dir),
            output_dir: env_path("DOCKET_BULK_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            report_dir: env_path("DOCKET_BULK_REPORT_DIR").unwrap_or(defaults.report_dir),
            record_extension: std::env::var("DOCKET_BULK_RECORD_EXTENSION")
                .unwrap_or(defaults.record_extension),
            client_matter: std::env::var("DOCKET_BULK_CLIENT_MATTER").ok(),
            concurrency: parse_env_var("DOCKET_BULK_CONCURRENCY")?
                .unwrap_or(defaults.concurrency),
            http,
            retry,
            auth,
        })
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// HTTP client carrying the configured timeout and user agent
    pub fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(&self.http.user_agent)
            .timeout(self.http_timeout())
            .build()
    }

    /// Build the authenticator the credentials call for, if any. Logins go through `client`.
    pub fn authenticator(&self, client: &Client) -> Option<Arc<dyn Authenticator>> {
        if let Some(token) = &self.auth.token {
            return Some(Arc::new(StaticToken::new(token.clone())));
        }
        match (&self.auth.username, &self.auth.password) {
            (Some(username), Some(password)) => Some(Arc::new(LoginAuthenticator::new(
                client.clone(),
                self.auth.login_url.clone(),
                username.clone(),
                password.clone(),
            ))),
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if self.record_extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("Record extension must not be empty");
        }
        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!(
                "Retry backoff multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            );
        }
        Ok(())
    }
}

fn env_path(var_name: &str) -> Option<PathBuf> {
    std::env::var_os(var_name).map(PathBuf::from)
}

/// Helper function to parse environment variable as a specific type
fn parse_env_var<T>(var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display + Send + Sync + std::error::Error + 'static,
{
    match std::env::var(var_name) {
        Ok(val) => val.parse().map(Some).with_context(|| {
            format!("Failed to parse environment variable {} = '{}'", var_name, val)
        }),
        Err(_) => Ok(None),
    }
}
