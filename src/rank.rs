//! Ordering of finished target records.

use crate::error::ReportError;
use crate::rows::TargetRecord;

/// Sort records by pageviews, highest first, and keep the top `limit`.
///
/// The sort is stable: records with equal views keep the order they were
/// given in, which for a report run is the order targets were first seen in
/// the row stream. `limit` must be positive.
pub fn rank<'a, I>(records: I, limit: i64) -> Result<Vec<TargetRecord>, ReportError>
where
    I: IntoIterator<Item = &'a TargetRecord>,
{
    let keep = usize::try_from(limit)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(ReportError::InvalidLimit(limit))?;

    let mut ranked: Vec<TargetRecord> = records.into_iter().cloned().collect();
    ranked.sort_by(|a, b| b.pageviews.cmp(&a.pageviews));
    ranked.truncate(keep);
    Ok(ranked)
}
