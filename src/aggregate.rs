//! Fan-out of one batch to the pageviews client and attribution of the results.

use crate::batch::{Batch, Slot};
use crate::dates::DateRange;
use crate::pageviews::{FetchFailure, PageviewClient, TimeSeries, Transport};
use crate::utils::fmt_duration;
use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Batches slower than this are logged as warnings.
const SLOW_BATCH_THRESHOLD: Duration = Duration::from_secs(30);

/// How the requests of one batch settled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub succeeded: usize,
    pub no_data: usize,
    pub unavailable: usize,
    pub malformed: usize,
    /// Successful responses for a title that was already attributed.
    pub duplicates: usize,
}

/// Views attributed by one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchTotals {
    /// Target title to views gained in this batch. Targets with no successful
    /// responses are absent.
    pub per_target: IndexMap<String, u64>,
    /// Sum of `per_target`.
    pub total: u64,
    pub stats: BatchStats,
}

pub struct BatchAggregator<T> {
    client: PageviewClient<T>,
}

impl<T: Transport> BatchAggregator<T> {
    pub fn new(client: PageviewClient<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PageviewClient<T> {
        &self.client
    }

    /// Query every unresolved title of `batch` concurrently and attribute the views.
    ///
    /// All requests are awaited before any attribution happens; a failing
    /// title contributes zero and never cancels its siblings. Attributed
    /// members are marked resolved in `batch`.
    pub async fn aggregate(&self, batch: &mut Batch, range: &DateRange) -> BatchTotals {
        let start = Instant::now();

        let requests = batch.pending().map(|(slot, title)| async move {
            (slot, self.client.fetch(title, range).await)
        });
        let settled: Vec<(Slot, Result<TimeSeries, FetchFailure>)> = join_all(requests).await;

        let mut stats = BatchStats::default();
        let mut plan: Vec<(Slot, u64)> = Vec::new();
        {
            let index = batch.reverse_index();
            let mut claimed: HashSet<Slot> = HashSet::new();

            for (queried, result) in settled {
                let series = match result {
                    Ok(series) => series,
                    Err(FetchFailure::NoData) => {
                        stats.no_data += 1;
                        continue;
                    }
                    Err(FetchFailure::Unavailable { .. }) => {
                        stats.unavailable += 1;
                        continue;
                    }
                    Err(FetchFailure::Malformed { .. }) => {
                        stats.malformed += 1;
                        continue;
                    }
                };
                stats.succeeded += 1;

                let slot = match series.canonical_title().and_then(|t| index.get(t)) {
                    Some(slot) => *slot,
                    None => {
                        debug!(
                            canonical = ?series.canonical_title(),
                            "Canonical title not in batch, attributing to queried title"
                        );
                        queried
                    }
                };

                let already_resolved = batch.member(slot).is_some_and(|(_, m)| m.resolved);
                if already_resolved || !claimed.insert(slot) {
                    stats.duplicates += 1;
                    warn!(
                        canonical = ?series.canonical_title(),
                        "Duplicate response for an attributed title, ignoring"
                    );
                    continue;
                }
                plan.push((slot, series.total_views()));
            }
        }

        let mut totals = BatchTotals {
            stats,
            ..BatchTotals::default()
        };
        for (slot, views) in plan {
            let Some((target, _)) = batch.member(slot) else {
                continue;
            };
            let target = target.to_owned();
            batch.mark_resolved(slot);
            *totals.per_target.entry(target).or_default() += views;
            totals.total += views;
        }

        let elapsed = start.elapsed();
        info!(
            batch = batch.index(),
            titles = batch.len(),
            succeeded = stats.succeeded,
            no_data = stats.no_data,
            unavailable = stats.unavailable,
            malformed = stats.malformed,
            views = totals.total,
            duration = fmt_duration(elapsed),
            "Batch settled"
        );
        if elapsed > SLOW_BATCH_THRESHOLD {
            warn!(
                batch = batch.index(),
                duration = fmt_duration(elapsed),
                "Slow batch (likely throttling or network delays)"
            );
        }

        totals
    }
}
