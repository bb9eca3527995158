// HOT score formula.
//
// raw   = views * 1 + likes * 10 + comments * 20
// decay = max(0, 1 - hours_elapsed / (window_days * 24))
// score = raw * decay
//
// A comment is worth twice a like and twenty views: it is the strongest
// engagement signal a board has. Decay is linear across the window and hits
// zero exactly at the boundary.

use chrono::{DateTime, Utc};

use super::{EngagementSnapshot, ScoredCandidate};

/// Per-counter weights for the raw engagement sum.
#[derive(Debug, Clone)]
pub struct HotScoreWeights {
    /// Weight per view (default 1.0)
    pub view_weight: f64,
    /// Weight per like (default 10.0)
    pub like_weight: f64,
    /// Weight per visible comment (default 20.0)
    pub comment_weight: f64,
}

impl Default for HotScoreWeights {
    fn default() -> Self {
        Self {
            view_weight: 1.0,
            like_weight: 10.0,
            comment_weight: 20.0,
        }
    }
}

/// Undecayed engagement weight.
pub fn raw_engagement(views: u64, likes: u64, comment_count: u64, weights: &HotScoreWeights) -> f64 {
    views as f64 * weights.view_weight
        + likes as f64 * weights.like_weight
        + comment_count as f64 * weights.comment_weight
}

/// Linear decay factor in [0, 1].
///
/// Posts dated in the future (clock skew between writers) count as brand new.
pub fn decay_factor(created_at: DateTime<Utc>, now: DateTime<Utc>, window_days: u32) -> f64 {
    let window_hours = f64::from(window_days) * 24.0;
    if window_hours <= 0.0 {
        return 0.0;
    }
    let hours_elapsed = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
    (1.0 - hours_elapsed / window_hours).clamp(0.0, 1.0)
}

/// Compute the time-decayed HOT score for one post.
pub fn compute_hot_score(
    views: u64,
    likes: u64,
    comment_count: u64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window_days: u32,
    weights: &HotScoreWeights,
) -> f64 {
    raw_engagement(views, likes, comment_count, weights) * decay_factor(created_at, now, window_days)
}

/// Score a collected snapshot. The result is unranked.
pub fn score_snapshot(
    snapshot: EngagementSnapshot,
    now: DateTime<Utc>,
    window_days: u32,
    weights: &HotScoreWeights,
) -> ScoredCandidate {
    let score = compute_hot_score(
        snapshot.views,
        snapshot.likes,
        snapshot.comment_count,
        snapshot.created_at,
        now,
        window_days,
        weights,
    );
    ScoredCandidate {
        snapshot,
        score,
        rank: None,
    }
}
