//! Configuration module for the popular pages engine.
//!
//! Values come from an optional TOML file (`popular-pages.toml`, or the path in
//! `POPULAR_PAGES_CONFIG`) and from environment variables prefixed with
//! `POPULAR_PAGES_`, the latter taking precedence.
//! Durations accept either integer seconds or strings like `10ms`, `3s`, `2m`.

use crate::batch::DEFAULT_BATCH_THRESHOLD;
use crate::pageviews::{
    DEFAULT_BASE_URL, HttpSettings, HttpTransport, PageviewClient, PageviewEndpoint, RetryPolicy,
    RetryTransport,
};
use crate::report::{DEFAULT_MAX_PROJECT_ROWS, EngineOptions};
use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub const ENV_PREFIX: &str = "POPULAR_PAGES_";
pub const CONFIG_FILE: &str = "popular-pages.toml";
pub const CONFIG_PATH_VAR: &str = "POPULAR_PAGES_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for the application
    ///
    /// Controls the verbosity of this crate's logs. Dependencies stay at
    /// `warn` unless `RUST_LOG` overrides the whole filter.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_pageviews_base_url")]
    pub pageviews_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_access")]
    pub access: String,
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// Titles per batch before it is closed and queried
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    /// Minimum spacing between two outgoing requests
    #[serde(
        default = "default_request_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub request_interval: Duration,
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub connect_timeout: Duration,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,

    /// First backoff delay after a throttled or failed attempt
    #[serde(
        default = "default_retry_base_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_base_delay: Duration,
    /// Upper bound for any single backoff, including server `Retry-After` hints
    #[serde(
        default = "default_retry_max_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_max_delay: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Projects with more rows than this are skipped
    #[serde(default = "default_max_project_rows")]
    pub max_project_rows: usize,

    /// Bound on a whole report run; unset means no bound
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub run_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            pageviews_base_url: default_pageviews_base_url(),
            user_agent: default_user_agent(),
            access: default_access(),
            agent: default_agent(),
            granularity: default_granularity(),
            batch_threshold: default_batch_threshold(),
            request_interval: default_request_interval(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            retry_base_delay: default_retry_base_delay(),
            retry_max_delay: default_retry_max_delay(),
            max_retries: default_max_retries(),
            max_project_rows: default_max_project_rows(),
            run_timeout: None,
        }
    }
}

impl Config {
    /// Providers in increasing precedence: defaults, config file, environment.
    pub fn figment() -> Figment {
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| CONFIG_FILE.to_owned());
        Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to load config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.batch_threshold > 0, "batch_threshold must be positive");
        anyhow::ensure!(
            self.retry_base_delay <= self.retry_max_delay,
            "retry_base_delay ({:?}) exceeds retry_max_delay ({:?})",
            self.retry_base_delay,
            self.retry_max_delay
        );
        Ok(())
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            request_interval: self.request_interval,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
            max_retries: self.max_retries,
        }
    }

    /// Endpoint for `project`, a domain such as `en.wikipedia`.
    pub fn endpoint(&self, project: &str) -> PageviewEndpoint {
        PageviewEndpoint {
            base_url: self.pageviews_base_url.clone(),
            project: project.to_owned(),
            access: self.access.clone(),
            agent: self.agent.clone(),
            granularity: self.granularity.clone(),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            batch_threshold: self.batch_threshold,
            max_project_rows: self.max_project_rows,
            run_timeout: self.run_timeout,
        }
    }

    /// Fully wired HTTP client stack: spacing, retries, then the pageviews client.
    pub fn pageview_client(
        &self,
        project: &str,
    ) -> anyhow::Result<PageviewClient<RetryTransport<HttpTransport>>> {
        let transport = HttpTransport::new(&self.http_settings())
            .context("Failed to create HTTP transport")?;
        Ok(PageviewClient::new(
            RetryTransport::new(transport, self.retry_policy()),
            self.endpoint(project),
        ))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pageviews_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!(
        "popular-pages/{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_SHORT")
    )
}

fn default_access() -> String {
    "all-access".to_string()
}

fn default_agent() -> String {
    "user".to_string()
}

fn default_granularity() -> String {
    "monthly".to_string()
}

fn default_batch_threshold() -> usize {
    DEFAULT_BATCH_THRESHOLD
}

fn default_request_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    10
}

fn default_max_project_rows() -> usize {
    DEFAULT_MAX_PROJECT_ROWS
}

/// Duration parser configured to handle various time units with seconds as default
///
/// Supports: ms, s, m, h (seconds when no unit is given)
fn duration_parser() -> DurationParser<'static> {
    DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let parsed = duration_parser()
        .parse(value.trim())
        .map_err(|e| e.to_string())?;
    Duration::try_from(parsed).map_err(|e| e.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration(self) -> Result<Duration, String> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => parse_duration(&text)
                .map_err(|e| format!("Invalid duration format '{text}': {e}. Examples: '3s', '10ms', '2m'")),
        }
    }
}

/// Custom deserializer for duration fields that accepts both numeric and string values
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?
        .into_duration()
        .map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawDuration>::deserialize(deserializer)?
        .map(RawDuration::into_duration)
        .transpose()
        .map_err(serde::de::Error::custom)
}
