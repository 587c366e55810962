//! Rate-limited, retrying request executor
//!
//! Every upstream request funnels through [`RetryingFetcher::fetch`]:
//!
//! | Outcome | Action |
//! |---------|--------|
//! | 2xx | Return the response |
//! | 403 | Invalidate the token, back off, retry |
//! | 429, 5xx, transport error | Back off, retry |
//! | Other status | Fail immediately |
//! | Token failure or cancellation | Fail immediately, no retry |
//!
//! Retries stop after `max_attempts` attempts or once the next wait would
//! overrun the total-time budget.

use crate::api::backoff::{is_retryable_status, RetryPolicy};
use crate::api::TokenProvider;
use crate::config::RateLimitConfig;
use crate::{HarvestError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A GET request against the vacancy API
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub query: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// A successful (2xx) response with its body fully read
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

/// What a single attempt produced
enum Attempt {
    Success(FetchResponse),
    Status(u16),
    Transport(reqwest::Error),
}

/// Issues rate-limited, authenticated requests with bounded retries
pub struct RetryingFetcher {
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    limiter: Arc<DirectRateLimiter>,
    policy: RetryPolicy,
    user_agent: String,
}

impl RetryingFetcher {
    /// Creates a fetcher with its own token-bucket limiter
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::InvalidInput` if the bucket capacity or refill
    /// rate is zero.
    pub fn new(
        client: Client,
        tokens: Arc<dyn TokenProvider>,
        rate_limit: &RateLimitConfig,
        policy: RetryPolicy,
        user_agent: &str,
    ) -> Result<Self> {
        let refill = NonZeroU32::new(rate_limit.refill_per_second).ok_or_else(|| {
            HarvestError::InvalidInput("refill-per-second must be > 0".to_string())
        })?;
        let capacity = NonZeroU32::new(rate_limit.capacity).ok_or_else(|| {
            HarvestError::InvalidInput("rate-limit capacity must be > 0".to_string())
        })?;
        let quota = Quota::per_second(refill).allow_burst(capacity);

        Ok(Self {
            client,
            tokens,
            limiter: Arc::new(RateLimiter::direct(quota)),
            policy,
            user_agent: user_agent.to_string(),
        })
    }

    /// Executes `request`, retrying transient failures
    ///
    /// # Errors
    ///
    /// * `HarvestError::Cancelled` - `cancel` fired during any wait or request
    /// * `HarvestError::AuthFailure` - no token could be obtained
    /// * `HarvestError::FetchFailed` - non-retryable status, attempts exhausted,
    ///   or total-time budget exceeded
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        request: &FetchRequest,
    ) -> Result<FetchResponse> {
        let started = Instant::now();
        let mut last_status = None;
        let mut last_cause = String::from("no attempt made");

        for attempt in 1..=self.policy.max_attempts {
            if started.elapsed() > self.policy.max_total_time {
                return Err(self.failed(
                    request,
                    last_status,
                    format!(
                        "retry budget of {:?} exhausted after {} attempts: {}",
                        self.policy.max_total_time,
                        attempt - 1,
                        last_cause
                    ),
                ));
            }

            self.acquire_permit(cancel).await?;
            let token = self.tokens.get_token(cancel).await?;

            let outcome = tokio::select! {
                outcome = self.execute(request, &token) => outcome,
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
            };

            match outcome {
                Attempt::Success(response) => return Ok(response),
                Attempt::Status(status) => {
                    if status == 403 {
                        self.tokens.mark_invalid(&token);
                    }
                    if !is_retryable_status(status) {
                        return Err(self.failed(
                            request,
                            Some(status),
                            format!("non-retryable HTTP {}", status),
                        ));
                    }
                    last_status = Some(status);
                    last_cause = format!("HTTP {}", status);
                }
                Attempt::Transport(e) => {
                    last_status = None;
                    last_cause = e.to_string();
                }
            }

            if attempt == self.policy.max_attempts {
                break;
            }

            let wait = self.policy.jittered_delay(attempt);
            if started.elapsed() + wait > self.policy.max_total_time {
                return Err(self.failed(
                    request,
                    last_status,
                    format!(
                        "retry budget of {:?} exhausted after {} attempts: {}",
                        self.policy.max_total_time, attempt, last_cause
                    ),
                ));
            }

            tracing::debug!(
                url = %request.url,
                attempt,
                wait_ms = wait.as_millis() as u64,
                cause = %last_cause,
                "Retrying upstream request"
            );
            sleep_or_cancel(wait, cancel).await?;
        }

        Err(self.failed(
            request,
            last_status,
            format!(
                "{} attempts exhausted: {}",
                self.policy.max_attempts, last_cause
            ),
        ))
    }

    async fn acquire_permit(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = self.limiter.until_ready() => Ok(()),
            _ = cancel.cancelled() => Err(HarvestError::Cancelled),
        }
    }

    async fn execute(&self, request: &FetchRequest, token: &str) -> Attempt {
        let sent = self
            .client
            .get(request.url.clone())
            .query(&request.query)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return Attempt::Transport(e),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Status(status.as_u16());
        }

        let url = response.url().to_string();
        match response.text().await {
            Ok(body) => Attempt::Success(FetchResponse {
                status: status.as_u16(),
                url,
                body,
            }),
            Err(e) => Attempt::Transport(e),
        }
    }

    fn failed(&self, request: &FetchRequest, status: Option<u16>, cause: String) -> HarvestError {
        HarvestError::FetchFailed {
            url: request.url.to_string(),
            status,
            cause,
        }
    }
}

/// Sleeps for `duration` unless `cancel` fires first
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(HarvestError::Cancelled),
    }
}
