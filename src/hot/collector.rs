// Candidate collection: recent visible posts plus live comment counts.
//
// The candidate set is capped before scoring to bound cost. The database
// pre-orders by `views + likes*10` so the cap keeps the most engaged posts;
// comment counts are only known after the cap, so a post that is hot purely
// on comments can still fall outside a saturated window.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::EngagementSnapshot;
use crate::db::Database;

/// Collect engagement snapshots for posts created in the last `window_days`.
///
/// Any read error aborts the collection; partial candidate sets are never
/// returned.
pub async fn collect(
    db: &dyn Database,
    now: DateTime<Utc>,
    window_days: u32,
    max_candidates: u32,
) -> Result<Vec<EngagementSnapshot>> {
    let since = now - Duration::days(i64::from(window_days));

    let posts = db
        .recent_posts(since, max_candidates)
        .await
        .context("Failed to collect recent posts")?;

    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let comment_counts = db
        .comment_counts(&post_ids)
        .await
        .context("Failed to aggregate comment counts")?;

    debug!(
        posts = posts.len(),
        with_comments = comment_counts.len(),
        "Collected HOT candidates"
    );

    Ok(posts
        .into_iter()
        .map(|post| EngagementSnapshot {
            comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
            post_id: post.id,
            title: post.title,
            board_slug: post.board_slug,
            author_id: post.author_id,
            created_at: post.created_at,
            views: post.views,
            likes: post.likes,
        })
        .collect())
}
