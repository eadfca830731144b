//! Errors that abort a report run.
//!
//! Per-title failures never show up here; they settle into
//! [`crate::pageviews::FetchFailure`] and contribute zero views.

use chrono::NaiveDate;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("report limit must be positive, got {0}")]
    InvalidLimit(i64),
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("project has {rows} rows, more than the maximum of {max}")]
    ProjectTooLarge { rows: usize, max: usize },
    #[error("report run did not finish within {0:?}")]
    TimedOut(Duration),
}
