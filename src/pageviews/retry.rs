//! Exponential backoff around any [`Transport`].
//!
//! Throttling (429) and temporary unavailability (503) are retried, as are
//! transport timeouts and connection failures. Everything else, including
//! 404, is handed straight back to the caller.

use super::errors::TransportError;
use super::transport::{Transport, TransportResponse};
use crate::utils::fmt_duration;
use async_trait::async_trait;
use http::StatusCode;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
    /// Ceiling for both computed delays and server `Retry-After` hints.
    pub max_delay: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    ///
    /// A server-provided `Retry-After` takes precedence over the computed
    /// backoff, but is still capped.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_delay);
        }
        let factor = 2u32.checked_pow(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Decorator that re-issues retryable requests with backoff.
///
/// When retries run out the last response (or error) is returned unchanged,
/// so the caller sees the final 429/503 and can classify it.
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        let mut retry = 0u32;
        loop {
            let outcome = self.inner.get(url).await;

            let (retryable, retry_after) = match &outcome {
                Ok(response) => (is_retryable_status(response.status), response.retry_after),
                Err(e) => (e.is_retryable(), None),
            };
            if !retryable {
                return outcome;
            }

            if retry >= self.policy.max_retries {
                match &outcome {
                    Ok(response) => warn!(
                        path = url.path(),
                        attempts = retry + 1,
                        status = response.status.as_u16(),
                        "Retries exhausted"
                    ),
                    Err(e) => warn!(
                        path = url.path(),
                        attempts = retry + 1,
                        error = %e,
                        "Retries exhausted"
                    ),
                }
                return outcome;
            }

            retry += 1;
            let delay = self.policy.delay_for(retry, retry_after);
            match &outcome {
                Ok(response) => info!(
                    attempt = retry,
                    delay = fmt_duration(delay),
                    status = response.status.as_u16(),
                    path = url.path(),
                    "Retrying pageviews request"
                ),
                Err(e) => info!(
                    attempt = retry,
                    delay = fmt_duration(delay),
                    error = %e,
                    path = url.path(),
                    "Retrying pageviews request"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }
}
