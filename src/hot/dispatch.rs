// Notification fan-out: one hot_post record per qualifying post author.
//
// Inserts are independent. A failed insert is logged and counted and the
// rest of the batch carries on; posts without an author are skipped without
// counting as failures.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::ScoredCandidate;
use crate::db::models::{NewNotification, NotificationKind};
use crate::db::Database;
use crate::output::truncate_chars;
use crate::pipeline::batch::for_each_batch;

/// Knobs for a dispatch pass.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Only ranks 1..=notify_max_rank are notified (default 10)
    pub notify_max_rank: u32,
    /// Concurrent inserts per batch (default 10)
    pub batch_size: usize,
    /// Pause between batches (default none)
    pub batch_pause: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            notify_max_rank: 10,
            batch_size: 10,
            batch_pause: Duration::ZERO,
        }
    }
}

/// Counts reported back to the job summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
    /// Eligible posts with no author to notify
    pub skipped: usize,
}

/// Build the notification for a ranked candidate.
pub fn build_notification(
    candidate: &ScoredCandidate,
    recipient_user_id: &str,
    now: DateTime<Utc>,
) -> NewNotification {
    let snapshot = &candidate.snapshot;
    let rank = candidate.rank.unwrap_or_default();
    NewNotification {
        recipient_user_id: recipient_user_id.to_string(),
        kind: NotificationKind::HotPost,
        title: "Your post is HOT".to_string(),
        body: format!(
            "\"{}\" is #{rank} on the HOT board.",
            truncate_chars(&snapshot.title, 40)
        ),
        link: format!("/boards/{}/{}", snapshot.board_slug, snapshot.post_id),
        metadata: serde_json::json!({
            "post_id": snapshot.post_id,
            "board_slug": snapshot.board_slug,
            "rank": rank,
            "score": (candidate.score * 100.0).round() / 100.0,
        }),
        created_at: now,
    }
}

/// Write notifications for every eligible candidate.
pub async fn dispatch(
    db: &dyn Database,
    candidates: &[ScoredCandidate],
    now: DateTime<Utc>,
    settings: &DispatchSettings,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    let mut pending = Vec::new();

    for candidate in candidates {
        if !candidate.rank.is_some_and(|r| r <= settings.notify_max_rank) {
            continue;
        }
        match candidate.snapshot.author_id.as_deref() {
            Some(author) if !author.is_empty() => {
                pending.push(build_notification(candidate, author, now));
            }
            _ => outcome.skipped += 1,
        }
    }

    let results = for_each_batch(
        pending,
        settings.batch_size,
        settings.batch_pause,
        |notification| async move {
            let result = db.insert_notification(&notification).await;
            (notification, result)
        },
    )
    .await;

    for (notification, result) in results {
        match result {
            Ok(_) => outcome.sent += 1,
            Err(e) => {
                warn!(
                    recipient = notification.recipient_user_id,
                    link = notification.link,
                    error = %e,
                    "Failed to write HOT notification"
                );
                outcome.failed += 1;
            }
        }
    }

    info!(
        sent = outcome.sent,
        failed = outcome.failed,
        skipped = outcome.skipped,
        "HOT notifications dispatched"
    );

    outcome
}
