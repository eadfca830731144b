//! Error types for the pageviews client.

use http::StatusCode;

/// Why a single title produced no views.
///
/// None of these abort a batch; the title simply contributes zero.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// The service has no data for the title (404 or an empty series).
    #[error("no pageview data")]
    NoData,
    /// Retries were exhausted, or the service answered with a non-retryable error.
    #[error("pageviews service unavailable: {reason}")]
    Unavailable {
        status: Option<StatusCode>,
        reason: String,
    },
    /// A success response whose body did not have the expected shape.
    #[error("malformed pageviews response: {reason}")]
    Malformed { reason: String },
}

/// Failure below the HTTP status level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Other(anyhow::Error),
}

impl TransportError {
    /// Timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_))
    }
}

impl From<reqwest_middleware::Error> for TransportError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            other => Self::Other(anyhow::Error::from(other)),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(anyhow::Error::from(err))
        }
    }
}
