//! Grouping of targets and their redirects into bounded request batches.
//!
//! The builder pulls rows lazily, so only the open batch plus the set of
//! titles already queued is held in memory, never the whole row stream.

use crate::rows::{PageRow, TargetRecord};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Member titles per batch.
///
/// The pageviews service allows roughly 100 requests per second; 60 keeps a
/// batch comfortably under that while the retry handler absorbs any overshoot.
pub const DEFAULT_BATCH_THRESHOLD: usize = 60;

/// A title to query and whether its views have been attributed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub title: String,
    pub resolved: bool,
}

/// Targets and the titles to query for each, dispatched as one unit.
#[derive(Debug, Default)]
pub struct Batch {
    index: usize,
    members: IndexMap<String, Vec<Member>>,
    new_targets: Vec<TargetRecord>,
    len: usize,
    rows_read: usize,
}

impl Batch {
    fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Zero-based position of this batch in the run.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of member titles queued in this batch.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows consumed from the source when this batch closed.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn target_count(&self) -> usize {
        self.members.len()
    }

    /// Target titles in insertion order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn members(&self, target: &str) -> Option<&[Member]> {
        self.members.get(target).map(Vec::as_slice)
    }

    /// Member at `(target index, member index)`.
    pub fn member(&self, slot: Slot) -> Option<(&str, &Member)> {
        let (target, members) = self.members.get_index(slot.target)?;
        Some((target.as_str(), members.get(slot.member)?))
    }

    /// Unresolved members with their slots, ready for dispatch.
    pub fn pending(&self) -> impl Iterator<Item = (Slot, &str)> {
        self.members
            .values()
            .enumerate()
            .flat_map(|(target, members)| {
                members.iter().enumerate().filter_map(move |(member, m)| {
                    (!m.resolved).then_some((Slot { target, member }, m.title.as_str()))
                })
            })
    }

    /// Every member title mapped to its slot, for attributing responses.
    pub fn reverse_index(&self) -> HashMap<&str, Slot> {
        let mut index = HashMap::with_capacity(self.len);
        for (target, members) in self.members.values().enumerate() {
            for (member, m) in members.iter().enumerate() {
                index.insert(m.title.as_str(), Slot { target, member });
            }
        }
        index
    }

    /// Mark a member as attributed. Returns `false` if it already was.
    pub fn mark_resolved(&mut self, slot: Slot) -> bool {
        let Some(m) = self
            .members
            .get_index_mut(slot.target)
            .and_then(|(_, members)| members.get_mut(slot.member))
        else {
            return false;
        };
        !std::mem::replace(&mut m.resolved, true)
    }

    /// Targets seen for the first time in the run while this batch was open.
    pub fn take_new_targets(&mut self) -> Vec<TargetRecord> {
        std::mem::take(&mut self.new_targets)
    }

    fn push_member(&mut self, target: &str, title: String) {
        self.members
            .entry(target.to_owned())
            .or_default()
            .push(Member {
                title,
                resolved: false,
            });
        self.len += 1;
    }
}

/// Position of a member inside a [`Batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub target: usize,
    pub member: usize,
}

/// Iterator adaptor turning page rows into batches.
///
/// A batch closes as soon as its member count reaches the threshold. The last
/// batch is yielded at end of input whatever its size, unless it is completely
/// empty. Each title is queued at most once per run: a target whose redirects
/// spill into a later batch is re-listed there with only the new redirects.
pub struct BatchBuilder<I> {
    rows: I,
    threshold: usize,
    total_rows: Option<usize>,
    rows_read: usize,
    known_targets: HashSet<String>,
    queued: HashSet<String>,
    open: Batch,
    done: bool,
}

impl<I: Iterator<Item = PageRow>> BatchBuilder<I> {
    /// `threshold` is clamped to at least one title.
    pub fn new(rows: I, threshold: usize, total_rows: Option<usize>) -> Self {
        Self {
            rows,
            threshold: threshold.max(1),
            total_rows,
            rows_read: 0,
            known_targets: HashSet::new(),
            queued: HashSet::new(),
            open: Batch::new(0),
            done: false,
        }
    }

    fn push_row(&mut self, row: PageRow) {
        if !self.known_targets.contains(&row.title) {
            self.known_targets.insert(row.title.clone());
            self.open.new_targets.push(TargetRecord::from_row(&row));
        }

        let PageRow {
            title,
            redirect_title,
            ..
        } = row;

        if self.queued.insert(title.clone()) {
            self.open.push_member(&title, title.clone());
        }
        if let Some(redirect) = redirect_title
            && self.queued.insert(redirect.clone())
        {
            self.open.push_member(&title, redirect);
        }
    }

    fn close(&mut self) -> Batch {
        let next = Batch::new(self.open.index + 1);
        let mut batch = std::mem::replace(&mut self.open, next);
        batch.rows_read = self.rows_read;

        info!(
            batch = batch.index,
            row = self.rows_read,
            total_rows = ?self.total_rows,
            titles = batch.len,
            targets = batch.target_count(),
            "Batch closed"
        );
        batch
    }
}

impl<I: Iterator<Item = PageRow>> Iterator for BatchBuilder<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.done {
            return None;
        }

        while let Some(row) = self.rows.next() {
            self.rows_read += 1;
            self.push_row(row);
            if self.open.len >= self.threshold {
                return Some(self.close());
            }
        }

        self.done = true;
        if self.open.is_empty() && self.open.new_targets.is_empty() {
            return None;
        }
        Some(self.close())
    }
}
