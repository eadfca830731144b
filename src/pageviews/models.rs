//! Pageviews API response shapes.

use crate::title::normalize_title;
use chrono::NaiveDate;
use serde::Deserialize;

/// Raw per-article response body.
#[derive(Debug, Deserialize)]
pub struct PageviewsResponse {
    #[serde(default)]
    pub items: Vec<PageviewItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageviewItem {
    pub article: String,
    /// `YYYYMMDDHH`
    pub timestamp: String,
    pub views: u64,
}

/// One point of a title's series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewEntry {
    /// Display form of the title as reported by the service.
    pub article_title: String,
    pub date: NaiveDate,
    pub views: u64,
}

/// Ordered views for exactly one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeries {
    entries: Vec<PageviewEntry>,
}

impl TimeSeries {
    /// Convert raw items, rejecting unparseable timestamps.
    pub fn from_items(items: Vec<PageviewItem>) -> Result<Self, String> {
        let entries = items
            .into_iter()
            .map(|item| {
                let date = item
                    .timestamp
                    .get(..8)
                    .and_then(|day| NaiveDate::parse_from_str(day, "%Y%m%d").ok())
                    .ok_or_else(|| format!("bad timestamp {:?}", item.timestamp))?;
                Ok(PageviewEntry {
                    article_title: normalize_title(&item.article),
                    date,
                    views: item.views,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PageviewEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Title the service reported, in display form.
    pub fn canonical_title(&self) -> Option<&str> {
        self.entries.first().map(|e| e.article_title.as_str())
    }

    /// Sum of views over every entry.
    pub fn total_views(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.views))
    }
}
