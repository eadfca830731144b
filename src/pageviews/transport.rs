//! The seam between the pageviews client and the network.
//!
//! [`HttpTransport`] is the production implementation; decorators such as
//! [`super::retry::RetryTransport`] wrap any [`Transport`], and tests script
//! responses by implementing the trait directly.

use super::errors::TransportError;
use super::spacing::RequestSpacingMiddleware;
use anyhow::Context;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode, header::RETRY_AFTER};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Status, retry hint and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single GET. Non-2xx statuses are responses, not errors.
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        (**self).get(url).await
    }
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Minimum spacing between requests; zero disables spacing.
    pub request_interval: Duration,
}

/// reqwest-backed transport with request spacing applied as middleware.
pub struct HttpTransport {
    http: ClientWithMiddleware,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to build reqwest client")?;

        let mut builder = ClientBuilder::new(client);
        if let Some(spacing) = RequestSpacingMiddleware::new(settings.request_interval) {
            builder = builder.with(spacing);
        }

        Ok(Self {
            http: builder.build(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await?;

        debug!(path = url.path(), status = status.as_u16(), "Pageviews response");
        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
