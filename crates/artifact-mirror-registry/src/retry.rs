//! Bounded exponential-backoff retry around an [`HttpTransport`].
//!
//! Only the statuses in [`RetryPolicy::retryable_statuses`] are retried.
//! Connection failures and every other non-2xx status fail on the spot.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// How failed requests are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff unit; the sleep after attempt `n` is `base_delay * 2^n`.
    pub base_delay: Duration,
    /// Statuses that are retried.
    pub retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Ten attempts, one second backoff unit, retrying 500, 502, 503 and 504.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            retryable_statuses: vec![500, 502, 503, 504],
        }
    }

    /// Sets the attempt cap.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff unit.
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Returns true if `status` is retried.
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Returns the sleep after the given 1-based attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends requests through a transport, retrying transient failures.
#[derive(Clone)]
pub struct RetryingClient {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryingClient {
    /// Creates a client with the default policy.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request`, returning the first 2xx response.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::ConnectionFailed`] on a network error, without retrying.
    /// - [`RegistryError::HttpError`] on a non-retryable status, carrying the body.
    /// - [`RegistryError::RetriesExhausted`] once every attempt returned a
    ///   retryable status.
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RegistryError> {
        let mut attempt = 0;
        loop {
            let response = self.transport.send(request).await?;
            attempt += 1;

            if response.is_success() {
                debug!(url = %request.url, attempt, status = response.status, "request succeeded");
                return Ok(response);
            }

            if !self.policy.is_retryable(response.status) {
                return Err(RegistryError::HttpError {
                    url: request.url.clone(),
                    status: response.status,
                    body: response.text(),
                });
            }

            if attempt >= self.policy.max_attempts {
                return Err(RegistryError::RetriesExhausted {
                    url: request.url.clone(),
                    attempts: attempt,
                    status: response.status,
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                url = %request.url,
                attempt,
                status = response.status,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Sends `request` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns any error from [`RetryingClient::send`], or a JSON error.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: &HttpRequest,
    ) -> Result<T, RegistryError> {
        self.send(request).await?.json()
    }
}
