//! Client for the Wikimedia per-article pageviews REST API.
//!
//! One [`PageviewClient::fetch`] is one request for one title. Throttling is
//! handled underneath by [`retry::RetryTransport`]; what reaches the caller is
//! either a [`TimeSeries`] or a [`FetchFailure`] describing why the title
//! contributes nothing.

pub mod errors;
pub mod models;
pub mod retry;
pub mod spacing;
pub mod transport;

pub use errors::{FetchFailure, TransportError};
pub use models::{PageviewEntry, TimeSeries};
pub use retry::{RetryPolicy, RetryTransport};
pub use transport::{HttpSettings, HttpTransport, Transport, TransportResponse};

use crate::dates::DateRange;
use crate::json::parse_json_with_context;
use crate::title::encode_path_title;
use http::StatusCode;
use models::PageviewsResponse;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str =
    "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article";

/// Which slice of the pageviews data to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewEndpoint {
    pub base_url: String,
    /// Project domain such as `en.wikipedia`.
    pub project: String,
    pub access: String,
    pub agent: String,
    pub granularity: String,
}

impl PageviewEndpoint {
    /// Defaults: all access methods, human users, monthly granularity.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            project: project.into(),
            access: "all-access".to_owned(),
            agent: "user".to_owned(),
            granularity: "monthly".to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct PageviewClient<T> {
    transport: T,
    endpoint: PageviewEndpoint,
}

impl<T: Transport> PageviewClient<T> {
    pub fn new(transport: T, endpoint: PageviewEndpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &PageviewEndpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `{base}/{project}/{access}/{agent}/{title}/{granularity}/{start}/{end}`
    pub fn request_url(&self, title: &str, range: &DateRange) -> Result<Url, url::ParseError> {
        let e = &self.endpoint;
        Url::parse(&format!(
            "{}/{}/{}/{}/{}/{}/{}/{}",
            e.base_url.trim_end_matches('/'),
            e.project,
            e.access,
            e.agent,
            encode_path_title(title),
            e.granularity,
            range.api_start(),
            range.api_end(),
        ))
    }

    /// Fetch the series for one title over `range`.
    pub async fn fetch(&self, title: &str, range: &DateRange) -> Result<TimeSeries, FetchFailure> {
        let url = self
            .request_url(title, range)
            .map_err(|e| FetchFailure::Unavailable {
                status: None,
                reason: TransportError::from(e).to_string(),
            })?;

        let response = match self.transport.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(title, error = %e, "Pageviews request failed");
                return Err(FetchFailure::Unavailable {
                    status: None,
                    reason: e.to_string(),
                });
            }
        };

        match response.status {
            StatusCode::NOT_FOUND => {
                debug!(title, "No pageview data");
                Err(FetchFailure::NoData)
            }
            status if status.is_success() => parse_series(title, &response.body),
            status => {
                warn!(title, status = status.as_u16(), "Pageviews request failed");
                Err(FetchFailure::Unavailable {
                    status: Some(status),
                    reason: format!("service responded with {status}"),
                })
            }
        }
    }
}

fn parse_series(title: &str, body: &str) -> Result<TimeSeries, FetchFailure> {
    let malformed = |reason: String| {
        warn!(title, reason = %reason, "Malformed pageviews response");
        FetchFailure::Malformed { reason }
    };

    let parsed: PageviewsResponse =
        parse_json_with_context(body).map_err(|e| malformed(format!("{e:#}")))?;
    let series = TimeSeries::from_items(parsed.items).map_err(malformed)?;

    if series.is_empty() {
        debug!(title, "Empty pageview series");
        return Err(FetchFailure::NoData);
    }
    Ok(series)
}
