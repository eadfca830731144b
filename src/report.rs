//! Report runs: rows in, ranked pages and a grand total out.

use crate::aggregate::BatchAggregator;
use crate::batch::{BatchBuilder, DEFAULT_BATCH_THRESHOLD};
use crate::dates::DateRange;
use crate::error::ReportError;
use crate::pageviews::{PageviewClient, Transport};
use crate::rank::rank;
use crate::rows::{PageRow, TargetRecord};
use crate::utils::fmt_duration;
use chrono::NaiveDate;
use indexmap::IndexMap;
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Projects with more rows than this are skipped.
pub const DEFAULT_MAX_PROJECT_ROWS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub batch_threshold: usize,
    pub max_project_rows: usize,
    /// Bound on the whole aggregation; on expiry nothing is reported.
    pub run_timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            max_project_rows: DEFAULT_MAX_PROJECT_ROWS,
            run_timeout: None,
        }
    }
}

/// Views across every target of a run, truncated or not.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTotal {
    total_pageviews: u64,
}

impl RunTotal {
    pub fn get(&self) -> u64 {
        self.total_pageviews
    }

    fn add(&mut self, views: u64) {
        self.total_pageviews = self.total_pageviews.saturating_add(views);
    }
}

/// Every target record of a run plus the grand total, before ranking.
#[derive(Debug, Default, Clone)]
pub struct Aggregation {
    /// Keyed by target title, in first-seen order.
    pub records: IndexMap<String, TargetRecord>,
    pub run_total: RunTotal,
}

/// One line of the finished report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPage {
    pub title: String,
    pub pageviews: u64,
    pub assessment_class: String,
    pub assessment_importance: String,
    pub average_per_day: u64,
}

/// Input for the report renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u64,
    /// Distinct targets seen, before truncation.
    pub targets: usize,
    /// Grand total over all targets, not only the listed pages.
    pub total_pageviews: u64,
    pub pages: Vec<ReportPage>,
}

/// The aggregation engine for popular pages reports.
pub struct PopularPages<T> {
    aggregator: BatchAggregator<T>,
    options: EngineOptions,
}

impl<T: Transport> PopularPages<T> {
    pub fn new(client: PageviewClient<T>, options: EngineOptions) -> Self {
        Self {
            aggregator: BatchAggregator::new(client),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Build the ranked report for `rows` over `range`, keeping `limit` pages.
    ///
    /// `total_rows` is only used for progress logs and the size guard.
    pub async fn run<I>(
        &self,
        rows: I,
        total_rows: Option<usize>,
        range: &DateRange,
        limit: i64,
    ) -> Result<Report, ReportError>
    where
        I: Iterator<Item = PageRow>,
    {
        // Fail before spending any requests
        if limit <= 0 {
            return Err(ReportError::InvalidLimit(limit));
        }

        let aggregation = self.aggregate_all(rows, total_rows, range).await?;
        let ranked = rank(aggregation.records.values(), limit)?;
        let days = range.days();

        let pages = ranked
            .into_iter()
            .map(|record| ReportPage {
                average_per_day: record.pageviews / days,
                title: record.title,
                pageviews: record.pageviews,
                assessment_class: record.assessment_class,
                assessment_importance: record.assessment_importance,
            })
            .collect();

        Ok(Report {
            start: range.start(),
            end: range.end(),
            days,
            targets: aggregation.records.len(),
            total_pageviews: aggregation.run_total.get(),
            pages,
        })
    }

    /// Aggregate every batch and return all records, unranked.
    ///
    /// Batches run strictly one after another. If the run timeout expires,
    /// everything gathered so far is dropped.
    pub async fn aggregate_all<I>(
        &self,
        rows: I,
        total_rows: Option<usize>,
        range: &DateRange,
    ) -> Result<Aggregation, ReportError>
    where
        I: Iterator<Item = PageRow>,
    {
        if let Some(count) = total_rows
            && count > self.options.max_project_rows
        {
            warn!(
                rows = count,
                max = self.options.max_project_rows,
                "Project too large, skipping"
            );
            return Err(ReportError::ProjectTooLarge {
                rows: count,
                max: self.options.max_project_rows,
            });
        }

        let work = self.aggregate_batches(rows, total_rows, range);
        match self.options.run_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                error!(
                    timeout = fmt_duration(limit),
                    "Report run timed out, discarding partial totals"
                );
                ReportError::TimedOut(limit)
            }),
            None => Ok(work.await),
        }
    }

    async fn aggregate_batches<I>(
        &self,
        rows: I,
        total_rows: Option<usize>,
        range: &DateRange,
    ) -> Aggregation
    where
        I: Iterator<Item = PageRow>,
    {
        info!(
            total_rows = ?total_rows,
            start = %range.start(),
            end = %range.end(),
            "Fetching monthly pageviews"
        );
        let started = Instant::now();
        let mut aggregation = Aggregation::default();
        let mut batches = 0usize;

        for mut batch in BatchBuilder::new(rows, self.options.batch_threshold, total_rows) {
            for record in batch.take_new_targets() {
                aggregation
                    .records
                    .entry(record.title.clone())
                    .or_insert(record);
            }

            let totals = self.aggregator.aggregate(&mut batch, range).await;
            for (title, views) in totals.per_target {
                match aggregation.records.get_mut(&title) {
                    Some(record) => {
                        record.pageviews = record.pageviews.saturating_add(views);
                        aggregation.run_total.add(views);
                    }
                    None => warn!(title = %title, views, "Views attributed to an unknown target"),
                }
            }
            batches += 1;
        }

        debug_assert_eq!(
            aggregation
                .records
                .values()
                .map(|r| r.pageviews)
                .sum::<u64>(),
            aggregation.run_total.get()
        );

        info!(
            batches,
            targets = aggregation.records.len(),
            total_views = aggregation.run_total.get().to_formatted_string(&Locale::en),
            duration = fmt_duration(started.elapsed()),
            "Pageviews fetch complete"
        );
        aggregation
    }
}
