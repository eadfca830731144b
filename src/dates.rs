//! Inclusive date ranges for pageview queries.

use crate::error::ReportError;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

/// Format the pageviews API expects for `start` and `end` (hour suffix is always `00`).
const API_DATE_FORMAT: &str = "%Y%m%d00";

/// An inclusive `[start, end]` day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First through last day of the calendar month before `today`.
    pub fn previous_month(today: NaiveDate) -> Self {
        let first_of_month = today - Days::new(u64::from(today.day0()));
        let end = first_of_month - Days::new(1);
        let start = end - Days::new(u64::from(end.day0()));
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends.
    pub fn days(&self) -> u64 {
        // start <= end is enforced on construction
        (self.end - self.start).num_days().unsigned_abs() + 1
    }

    pub fn api_start(&self) -> String {
        self.start.format(API_DATE_FORMAT).to_string()
    }

    pub fn api_end(&self) -> String {
        self.end.format(API_DATE_FORMAT).to_string()
    }
}
