//! Shared fixtures for engine tests: an in-memory pageviews service.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use http::StatusCode;
use popular_pages::dates::DateRange;
use popular_pages::pageviews::{PageviewClient, PageviewEndpoint, Transport, TransportError, TransportResponse};
use popular_pages::report::{EngineOptions, PopularPages};
use popular_pages::rows::PageRow;
use popular_pages::title::normalize_title;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use url::Url;

/// Pageviews service fake.
///
/// Known pages answer with one item per monthly value; everything else is a
/// 404. Scripted statuses are served first, one per request.
#[derive(Default)]
pub struct FakeWiki {
    views: HashMap<String, Vec<u64>>,
    canonical: HashMap<String, String>,
    scripted: Mutex<HashMap<String, VecDeque<StatusCode>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, title: &str, monthly: &[u64]) -> Self {
        self.views.insert(title.to_owned(), monthly.to_vec());
        self
    }

    /// Report `title`'s views under a different article name.
    pub fn canonical(mut self, title: &str, article: &str) -> Self {
        self.canonical.insert(title.to_owned(), article.to_owned());
        self
    }

    pub fn script(self, title: &str, statuses: &[StatusCode]) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .insert(title.to_owned(), statuses.iter().copied().collect());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, title: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.as_str() == title)
            .count()
    }

    fn respond(&self, title: &str) -> TransportResponse {
        if let Some(status) = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(title)
            .and_then(VecDeque::pop_front)
        {
            return TransportResponse::new(status, "");
        }

        let Some(monthly) = self.views.get(title) else {
            return TransportResponse::new(StatusCode::NOT_FOUND, r#"{"type": "not_found"}"#);
        };
        let article = self
            .canonical
            .get(title)
            .cloned()
            .unwrap_or_else(|| title.replace(' ', "_"));
        TransportResponse::new(StatusCode::OK, body(&article, monthly))
    }
}

#[async_trait]
impl Transport for FakeWiki {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        let raw = segments[segments.len() - 4];
        let title = normalize_title(&urlencoding::decode(raw).unwrap());
        self.requests.lock().unwrap().push(title.clone());
        Ok(self.respond(&title))
    }
}

/// A pageviews API body with one item per value.
pub fn body(article: &str, monthly: &[u64]) -> String {
    let items: Vec<String> = monthly
        .iter()
        .enumerate()
        .map(|(i, views)| {
            format!(
                r#"{{"project": "en.wikipedia", "article": "{article}", "granularity": "monthly", "timestamp": "2024{:02}0100", "access": "all-access", "agent": "user", "views": {views}}}"#,
                i + 1
            )
        })
        .collect();
    format!(r#"{{"items": [{}]}}"#, items.join(", "))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn january() -> DateRange {
    DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap()
}

pub fn rows(pairs: &[(&str, Option<&str>)]) -> Vec<PageRow> {
    pairs
        .iter()
        .map(|(title, redirect)| PageRow::new(*title, *redirect))
        .collect()
}

pub fn client<T: Transport>(transport: T) -> PageviewClient<T> {
    PageviewClient::new(transport, PageviewEndpoint::new("en.wikipedia"))
}

pub fn engine(wiki: &Arc<FakeWiki>, batch_threshold: usize) -> PopularPages<Arc<FakeWiki>> {
    PopularPages::new(
        client(Arc::clone(wiki)),
        EngineOptions {
            batch_threshold,
            ..EngineOptions::default()
        },
    )
}
