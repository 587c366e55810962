//! Access token lifecycle for the upstream API
//!
//! Tokens are obtained with the client-credentials grant. The upstream limits
//! how often a client may request a new token, so acquisitions are spaced by a
//! minimum refresh interval and a caller that needs a token sooner waits out
//! the remainder of that interval.

use crate::api::TokenProvider;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const GRANT_TYPE: &str = "client_credentials";

/// Token endpoint settings
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,

    /// Minimum spacing between two acquisition attempts
    pub min_refresh_interval: Duration,

    /// Pre-issued token used until the API rejects it
    pub initial_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Debug, Default)]
struct TokenState {
    last_attempt: Option<Instant>,
}

/// The token handed to callers and whether the API has rejected it
#[derive(Debug, Default)]
struct CurrentToken {
    token: Option<String>,
    rejected: bool,
}

/// Owns the cached access token and its refresh policy
///
/// The refresh runs while the state lock is held, so at most one token request
/// is in flight; callers arriving during a refresh wait on the lock and then
/// see the freshly stored token. A rejection only counts against the token
/// the rejected request carried, so a late 403 for a replaced token leaves
/// the current one in place.
pub struct AccessTokenManager {
    client: Client,
    config: TokenConfig,
    state: Mutex<TokenState>,
    current: std::sync::Mutex<CurrentToken>,
    refreshes: AtomicU64,
}

impl AccessTokenManager {
    pub fn new(client: Client, config: TokenConfig) -> Self {
        // A pre-issued token counts as acquired before the cool-down started,
        // so its first rejection refreshes immediately.
        let current = CurrentToken {
            token: config.initial_token.clone().filter(|t| !t.is_empty()),
            rejected: false,
        };

        Self {
            client,
            config,
            state: Mutex::new(TokenState::default()),
            current: std::sync::Mutex::new(current),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Number of token requests sent to the token endpoint so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Returns the cached token, or acquires a new one
    ///
    /// # Errors
    ///
    /// * `HarvestError::Cancelled` - `cancel` fired while waiting
    /// * `HarvestError::AuthFailure` - the token endpoint rejected the request
    ///   or returned no token
    pub async fn get_token(&self, cancel: &CancellationToken) -> Result<String> {
        let mut state = tokio::select! {
            guard = self.state.lock() => guard,
            _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
        };

        if let Some(token) = self.usable_token() {
            return Ok(token);
        }

        if let Some(last) = state.last_attempt {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_refresh_interval {
                let wait = self.config.min_refresh_interval - elapsed;
                tracing::info!(wait_ms = wait.as_millis() as u64, "Waiting before token refresh");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                }
            }
        }

        tracing::info!("Refreshing upstream access token");
        state.last_attempt = Some(Instant::now());
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        let outcome = tokio::select! {
            result = self.request_token() => result,
            _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
        };

        match outcome {
            Ok(token) => {
                *self.current() = CurrentToken {
                    token: Some(token.clone()),
                    rejected: false,
                };
                tracing::info!("Access token refreshed");
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Access token refresh failed");
                Err(e)
            }
        }
    }

    /// Marks `rejected` as refused by the API
    ///
    /// Has no effect once `rejected` is no longer the current token.
    pub fn mark_invalid(&self, rejected: &str) {
        let mut current = self.current();
        if current.token.as_deref() == Some(rejected) {
            current.rejected = true;
            tracing::warn!("Authorization rejected, token marked for refresh");
        } else {
            tracing::debug!("Ignoring rejection of an already replaced token");
        }
    }

    fn usable_token(&self) -> Option<String> {
        let current = self.current();
        match &current.token {
            Some(token) if !current.rejected => Some(token.clone()),
            _ => None,
        }
    }

    fn current(&self) -> MutexGuard<'_, CurrentToken> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_token(&self) -> Result<String> {
        let params = [
            ("grant_type", GRANT_TYPE),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| HarvestError::AuthFailure(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::AuthFailure(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::AuthFailure(format!("invalid token response: {}", e)))?;

        if body.access_token.is_empty() {
            return Err(HarvestError::AuthFailure(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        Ok(body.access_token)
    }
}

#[async_trait]
impl TokenProvider for AccessTokenManager {
    async fn get_token(&self, cancel: &CancellationToken) -> Result<String> {
        AccessTokenManager::get_token(self, cancel).await
    }

    fn mark_invalid(&self, rejected: &str) {
        AccessTokenManager::mark_invalid(self, rejected)
    }
}
