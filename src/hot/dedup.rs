// Delivery-log deduplication.
//
// Reads every hot_post notification inside the cooldown window and drops
// candidates whose post already appears there. This is read-then-filter:
// two overlapping runs can both pass the check for the same post before
// either writes. The job is scheduled with a single active instance and the
// HTTP trigger refuses overlapping runs, so that window stays closed in
// practice.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::ScoredCandidate;
use crate::db::models::NotificationKind;
use crate::db::Database;

/// Post ids that received a hot_post notification since `since`.
pub async fn notified_post_ids(db: &dyn Database, since: DateTime<Utc>) -> Result<HashSet<i64>> {
    let records = db
        .notifications_since(Some(&NotificationKind::HotPost), since)
        .await
        .context("Failed to read notification delivery log")?;
    Ok(records.iter().filter_map(|r| r.post_id()).collect())
}

/// Drop candidates already notified within `cooldown_hours` of `now`.
///
/// Returns the surviving candidates and how many were dropped.
pub async fn filter_unnotified(
    db: &dyn Database,
    candidates: Vec<ScoredCandidate>,
    now: DateTime<Utc>,
    cooldown_hours: u32,
) -> Result<(Vec<ScoredCandidate>, usize)> {
    let since = now - Duration::hours(i64::from(cooldown_hours));
    let notified = notified_post_ids(db, since).await?;

    let before = candidates.len();
    let remaining: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| !notified.contains(&c.post_id()))
        .collect();
    let dropped = before - remaining.len();

    debug!(
        notified_in_window = notified.len(),
        dropped, "Filtered already-notified HOT posts"
    );

    Ok((remaining, dropped))
}
