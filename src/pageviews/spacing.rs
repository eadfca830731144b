//! Minimum spacing between outbound pageviews requests.
//!
//! Every request from a batch is dispatched at once; the limiter releases
//! them one `interval` apart so a batch never bursts past the service ceiling.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::trace;

/// Paces callers so that at most one proceeds per `interval`.
pub struct RequestSpacer {
    limiter: DefaultDirectRateLimiter,
}

impl RequestSpacer {
    /// `None` when `interval` is zero, meaning no spacing.
    pub fn new(interval: Duration) -> Option<Self> {
        let quota = Quota::with_period(interval)?.allow_burst(NonZeroU32::MIN);
        Some(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Wait until this caller's slot comes up.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// reqwest middleware applying a shared [`RequestSpacer`] to every request.
pub struct RequestSpacingMiddleware {
    spacer: RequestSpacer,
}

impl RequestSpacingMiddleware {
    pub fn new(interval: Duration) -> Option<Self> {
        RequestSpacer::new(interval).map(|spacer| Self { spacer })
    }
}

#[async_trait]
impl Middleware for RequestSpacingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.spacer.wait().await;
        trace!(path = req.url().path(), "Request released");
        next.run(req, extensions).await
    }
}
