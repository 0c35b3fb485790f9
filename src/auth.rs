//! Login tokens for the docket API

use crate::errors::AuthError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Source of login tokens. Implementations may perform network I/O.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<String, AuthError>;
}

/// A token issued out of band
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticToken {
    async fn authenticate(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// Response body of the login endpoint
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    login_token: Option<String>,
    error: Option<String>,
}

/// Exchanges username and password for a login token
pub struct LoginAuthenticator {
    client: Client,
    login_url: String,
    username: String,
    password: String,
}

impl LoginAuthenticator {
    /// `client` should carry the run's timeout and user agent
    pub fn new(client: Client, login_url: String, username: String, password: String) -> Self {
        Self {
            client,
            login_url,
            username,
            password,
        }
    }
}

#[async_trait]
impl Authenticator for LoginAuthenticator {
    async fn authenticate(&self) -> Result<String, AuthError> {
        debug!("Logging in at {}", self.login_url);

        let response = self
            .client
            .post(&self.login_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(format!("HTTP {}", status)));
        }

        let body: LoginResponse = response.json().await?;
        match (body.success, body.login_token) {
            (true, Some(token)) => Ok(token),
            _ => Err(AuthError::Rejected(
                body.error
                    .unwrap_or_else(|| "login response carried no token".to_string()),
            )),
        }
    }
}

/// Shares one login token between all workers of a run.
///
/// Refreshes are single-flight: a worker holding an expired token calls
/// [`TokenCache::refresh`] with it, and only the first such call reaches the
/// authenticator. Later callers with the same stale token get the new one.
pub struct TokenCache {
    authenticator: Arc<dyn Authenticator>,
    token: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            token: Mutex::new(None),
        }
    }

    /// The cached token, logging in first if there is none yet
    pub async fn current(&self) -> Result<String, AuthError> {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }
        let fresh = self.authenticator.authenticate().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Replace `stale` with a fresh token unless another worker already did
    pub async fn refresh(&self, stale: &str) -> Result<String, AuthError> {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            if existing != stale {
                debug!("Token already refreshed by another worker");
                return Ok(existing.clone());
            }
        }
        info!("Login token expired, refreshing");
        let fresh = self.authenticator.authenticate().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }
}
