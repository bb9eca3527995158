// Ranking: stable sort by score, 1-based rank, truncate to top-N.

use super::ScoredCandidate;

/// Sort candidates by score descending, assign ranks 1..=N, keep the top `top_n`.
///
/// The sort is stable, so equal scores keep their collection order. NaN
/// scores (never produced by `compute_hot_score`) compare as equal.
pub fn rank(mut candidates: Vec<ScoredCandidate>, top_n: usize) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_n);
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = Some(i as u32 + 1);
    }
    candidates
}

/// Ranked candidates eligible for notification (rank <= `max_rank`).
pub fn notification_window(ranked: &[ScoredCandidate], max_rank: u32) -> Vec<ScoredCandidate> {
    ranked
        .iter()
        .filter(|c| c.rank.is_some_and(|r| r <= max_rank))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hot::EngagementSnapshot;
    use chrono::Utc;

    fn candidate(post_id: i64, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            snapshot: EngagementSnapshot {
                post_id,
                title: format!("post {post_id}"),
                board_slug: "epl".to_string(),
                author_id: None,
                created_at: Utc::now(),
                views: 0,
                likes: 0,
                comment_count: 0,
            },
            score,
            rank: None,
        }
    }

    #[test]
    fn test_ties_keep_collection_order() {
        let ranked = rank(
            vec![candidate(1, 5.0), candidate(2, 9.0), candidate(3, 5.0)],
            10,
        );
        let ids: Vec<i64> = ranked.iter().map(|c| c.post_id()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_truncates_before_numbering() {
        let ranked = rank(
            (1..=30).map(|i| candidate(i, i as f64)).collect(),
            20,
        );
        assert_eq!(ranked.len(), 20);
        assert_eq!(ranked[0].post_id(), 30);
        assert_eq!(ranked[19].rank, Some(20));
    }

    #[test]
    fn test_notification_window() {
        let ranked = rank((1..=20).map(|i| candidate(i, i as f64)).collect(), 20);
        let window = notification_window(&ranked, 10);
        assert_eq!(window.len(), 10);
        assert!(window.iter().all(|c| c.rank.unwrap() <= 10));
    }
}
