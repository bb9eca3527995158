// HOT-post job: one full pass of collect -> score -> rank -> dedup -> dispatch.
//
// Stateless between runs apart from the delivery log (notifications table)
// and two job_state keys for `pitchside status`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::HotPostSettings;
use crate::db::Database;
use crate::hot::dispatch::{dispatch, DispatchOutcome};
use crate::hot::{collector, dedup, ranker, score, ScoredCandidate};

/// job_state key holding the RFC 3339 time of the last non-dry run.
pub const LAST_RUN_KEY: &str = "hot_posts_last_run_at";

/// job_state key holding the last run's summary as JSON.
pub const LAST_SUMMARY_KEY: &str = "hot_posts_last_summary";

/// One entry of the ranked list as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopPost {
    pub rank: u32,
    pub title: String,
    pub score: f64,
}

/// Job result, serialized as the HTTP response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotPostSummary {
    pub success: bool,
    pub total_hot_posts: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub notifications_skipped: usize,
    pub already_notified: usize,
    pub top_posts: Vec<TopPost>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

/// Full result of a run: the ranked candidates plus the summary.
#[derive(Debug, Clone)]
pub struct HotPostRun {
    pub ranked: Vec<ScoredCandidate>,
    pub summary: HotPostSummary,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Run the HOT-post job once.
///
/// With `dry_run`, everything up to dedup runs and nothing is written.
/// A collection failure aborts the run; per-notification failures do not.
pub async fn run(
    db: &dyn Database,
    settings: &HotPostSettings,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<HotPostRun> {
    let snapshots = collector::collect(db, now, settings.window_days, settings.max_candidates)
        .await
        .context("HOT-post candidate collection failed")?;
    info!(candidates = snapshots.len(), "Collected HOT candidates");

    let scored: Vec<ScoredCandidate> = snapshots
        .into_iter()
        .map(|s| score::score_snapshot(s, now, settings.window_days, &settings.weights))
        .collect();

    let ranked = ranker::rank(scored, settings.top_n);
    let window = ranker::notification_window(&ranked, settings.notify_max_rank);

    let (to_notify, already_notified) =
        dedup::filter_unnotified(db, window, now, settings.cooldown_hours).await?;

    let outcome = if dry_run {
        info!(
            would_notify = to_notify.len(),
            already_notified, "Dry run: skipping notification dispatch"
        );
        DispatchOutcome::default()
    } else {
        dispatch(db, &to_notify, now, &settings.dispatch_settings()).await
    };

    let summary = HotPostSummary {
        success: true,
        total_hot_posts: ranked.len(),
        notifications_sent: outcome.sent,
        notifications_failed: outcome.failed,
        notifications_skipped: outcome.skipped,
        already_notified,
        top_posts: ranked
            .iter()
            .map(|c| TopPost {
                rank: c.rank.unwrap_or_default(),
                title: c.snapshot.title.clone(),
                score: round2(c.score),
            })
            .collect(),
        dry_run,
    };

    if !dry_run {
        record_run(db, &summary, now).await;
    }

    info!(
        total = summary.total_hot_posts,
        sent = summary.notifications_sent,
        failed = summary.notifications_failed,
        skipped = summary.notifications_skipped,
        already_notified = summary.already_notified,
        "HOT-post run complete"
    );

    Ok(HotPostRun { ranked, summary })
}

/// Persist last-run bookkeeping. Failures here never fail the run.
async fn record_run(db: &dyn Database, summary: &HotPostSummary, now: DateTime<Utc>) {
    if let Err(e) = db.set_job_state(LAST_RUN_KEY, &now.to_rfc3339()).await {
        warn!(error = %e, "Failed to record HOT-post run time");
    }
    match serde_json::to_string(summary) {
        Ok(json) => {
            if let Err(e) = db.set_job_state(LAST_SUMMARY_KEY, &json).await {
                warn!(error = %e, "Failed to record HOT-post summary");
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize HOT-post summary"),
    }
}
