// HOT-post engine: time-decayed popularity ranking and notification fan-out.
//
// Stages, in the order the job runs them:
//   collector -> score -> ranker -> dedup -> dispatch
//
// Everything here is stateless between runs. `now` is always passed in so a
// run (and its tests) see one consistent clock.

pub mod collector;
pub mod dedup;
pub mod dispatch;
pub mod ranker;
pub mod score;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement counters for one post, recomputed on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub post_id: i64,
    pub title: String,
    pub board_slug: String,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub comment_count: u64,
}

/// A snapshot with its score and, once ranked, its 1-based position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub snapshot: EngagementSnapshot,
    pub score: f64,
    pub rank: Option<u32>,
}

impl ScoredCandidate {
    pub fn post_id(&self) -> i64 {
        self.snapshot.post_id
    }
}
