// Composition tests: the HOT-post job end to end on in-memory SQLite.
//
// These tests exercise the data flow between modules:
//   collector -> score -> ranker -> dedup -> dispatch -> job_state
// with a fixed clock and no network or filesystem side effects.

#![cfg(feature = "sqlite")]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;

use pitchside::config::HotPostSettings;
use pitchside::db::models::{
    CacheIndexEntry, NewNotification, NotificationKind, NotificationRecord, PostRow,
};
use pitchside::db::queries;
use pitchside::db::schema::create_tables;
use pitchside::db::sqlite::SqliteDatabase;
use pitchside::db::Database;
use pitchside::hot::collector::collect;
use pitchside::hot::dispatch::{dispatch, DispatchSettings};
use pitchside::hot::ranker::rank;
use pitchside::hot::score::{score_snapshot, HotScoreWeights};
use pitchside::media::asset::AssetType;
use pitchside::pipeline::hot_posts::{self, LAST_RUN_KEY, LAST_SUMMARY_KEY};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 2, 15, 0, 0).unwrap()
}

struct Seed<'a> {
    title: &'a str,
    author: Option<&'a str>,
    views: u64,
    likes: u64,
    comments: usize,
    age_hours: i64,
}

/// Build an in-memory database holding `posts`. Returns the DB and post ids
/// in seed order.
fn seeded_db(posts: &[Seed]) -> (SqliteDatabase, Vec<i64>) {
    let conn = Connection::open_in_memory().unwrap();
    create_tables(&conn).unwrap();

    let mut ids = Vec::new();
    for seed in posts {
        let id = queries::insert_post(
            &conn,
            "epl",
            seed.title,
            seed.author,
            seed.views,
            seed.likes,
            now() - Duration::hours(seed.age_hours),
        )
        .unwrap();
        for i in 0..seed.comments {
            queries::insert_comment(&conn, id, Some("fan"), &format!("comment {i}"), false, false)
                .unwrap();
        }
        ids.push(id);
    }
    (SqliteDatabase::new(conn), ids)
}

fn simple<'a>(title: &'a str, author: &'a str, views: u64, age_hours: i64) -> Seed<'a> {
    Seed {
        title,
        author: Some(author),
        views,
        likes: 0,
        comments: 0,
        age_hours,
    }
}

// ============================================================
// Chain: collector -> score -> ranker
// ============================================================

#[tokio::test]
async fn collector_excludes_hidden_deleted_and_expired_posts() {
    let conn = Connection::open_in_memory().unwrap();
    create_tables(&conn).unwrap();
    let visible = queries::insert_post(&conn, "epl", "Visible", Some("a"), 10, 0, now()).unwrap();
    let hidden = queries::insert_post(&conn, "epl", "Hidden", Some("b"), 10, 0, now()).unwrap();
    let deleted = queries::insert_post(&conn, "epl", "Deleted", Some("c"), 10, 0, now()).unwrap();
    queries::insert_post(
        &conn,
        "epl",
        "Old",
        Some("d"),
        10,
        0,
        now() - Duration::days(8),
    )
    .unwrap();
    queries::set_post_flags(&conn, hidden, false, true).unwrap();
    queries::set_post_flags(&conn, deleted, true, false).unwrap();

    // Hidden and deleted comments never count
    queries::insert_comment(&conn, visible, Some("x"), "ok", false, false).unwrap();
    queries::insert_comment(&conn, visible, Some("x"), "gone", true, false).unwrap();
    queries::insert_comment(&conn, visible, Some("x"), "muted", false, true).unwrap();

    let db = SqliteDatabase::new(conn);
    let snapshots = collect(&db, now(), 7, 100).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].post_id, visible);
    assert_eq!(snapshots[0].comment_count, 1);
}

#[tokio::test]
async fn collector_cap_keeps_most_engaged_posts() {
    let seeds: Vec<Seed> = (0..10)
        .map(|i| Seed {
            title: "post",
            author: Some("a"),
            views: i * 10,
            likes: 0,
            comments: 0,
            age_hours: 1,
        })
        .collect();
    let (db, ids) = seeded_db(&seeds);

    let snapshots = collect(&db, now(), 7, 3).await.unwrap();
    let got: Vec<i64> = snapshots.iter().map(|s| s.post_id).collect();
    assert_eq!(got, vec![ids[9], ids[8], ids[7]]);
}

#[tokio::test]
async fn comments_change_the_ranking() {
    let (db, ids) = seeded_db(&[
        Seed {
            title: "Many views",
            author: Some("a"),
            views: 100,
            likes: 0,
            comments: 0,
            age_hours: 1,
        },
        Seed {
            title: "Lively thread",
            author: Some("b"),
            views: 10,
            likes: 0,
            comments: 6,
            age_hours: 1,
        },
    ]);

    let weights = HotScoreWeights::default();
    let scored = collect(&db, now(), 7, 100)
        .await
        .unwrap()
        .into_iter()
        .map(|s| score_snapshot(s, now(), 7, &weights))
        .collect();
    let ranked = rank(scored, 20);

    // 10 + 6*20 = 130 beats 100
    assert_eq!(ranked[0].post_id(), ids[1]);
    assert_eq!(ranked[0].rank, Some(1));
    assert_eq!(ranked[1].post_id(), ids[0]);
}

// ============================================================
// Full job: hot_posts::run
// ============================================================

#[tokio::test]
async fn run_notifies_top_ten_and_records_summary() {
    let seeds: Vec<Seed> = (0..25)
        .map(|i| Seed {
            title: "post",
            author: Some("author"),
            views: 100 + i as u64,
            likes: 0,
            comments: 0,
            age_hours: 1,
        })
        .collect();
    let (db, _) = seeded_db(&seeds);
    let settings = HotPostSettings::default();

    let run = hot_posts::run(&db, &settings, now(), false).await.unwrap();
    let summary = &run.summary;

    assert!(summary.success);
    assert_eq!(summary.total_hot_posts, 20);
    assert_eq!(summary.top_posts.len(), 20);
    assert_eq!(summary.notifications_sent, 10);
    assert_eq!(summary.notifications_failed, 0);
    assert_eq!(summary.already_notified, 0);

    let records = db
        .notifications_since(Some(&NotificationKind::HotPost), now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 10);
    let mut ranks: Vec<i64> = records
        .iter()
        .map(|r| r.metadata["rank"].as_i64().unwrap())
        .collect();
    ranks.sort_unstable();
    assert_eq!(ranks, (1..=10).collect::<Vec<i64>>());

    assert!(db.get_job_state(LAST_RUN_KEY).await.unwrap().is_some());
    let stored = db.get_job_state(LAST_SUMMARY_KEY).await.unwrap().unwrap();
    assert!(stored.contains("\"notificationsSent\":10"));
}

#[tokio::test]
async fn second_run_within_cooldown_sends_nothing() {
    let (db, _) = seeded_db(&[
        simple("Derby", "a", 500, 2),
        simple("Transfer rumour", "b", 300, 3),
    ]);
    let settings = HotPostSettings::default();

    let first = hot_posts::run(&db, &settings, now(), false).await.unwrap();
    assert_eq!(first.summary.notifications_sent, 2);

    let second = hot_posts::run(&db, &settings, now() + Duration::hours(1), false)
        .await
        .unwrap();
    assert_eq!(second.summary.notifications_sent, 0);
    assert_eq!(second.summary.already_notified, 2);
    assert_eq!(second.summary.total_hot_posts, 2);
}

#[tokio::test]
async fn cooldown_expiry_allows_renotification() {
    let (db, _) = seeded_db(&[simple("Derby", "a", 500, 1)]);
    let settings = HotPostSettings::default();

    hot_posts::run(&db, &settings, now(), false).await.unwrap();
    let later = hot_posts::run(&db, &settings, now() + Duration::hours(25), false)
        .await
        .unwrap();
    assert_eq!(later.summary.notifications_sent, 1);
    assert_eq!(later.summary.already_notified, 0);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let (db, _) = seeded_db(&[simple("Derby", "a", 500, 1)]);
    let run = hot_posts::run(&db, &HotPostSettings::default(), now(), true)
        .await
        .unwrap();

    assert!(run.summary.dry_run);
    assert_eq!(run.summary.total_hot_posts, 1);
    assert_eq!(run.summary.notifications_sent, 0);
    assert!(db.notification_counts().await.unwrap().is_empty());
    assert!(db.get_job_state(LAST_RUN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_window_is_a_successful_noop() {
    let (db, _) = seeded_db(&[]);
    let run = hot_posts::run(&db, &HotPostSettings::default(), now(), false)
        .await
        .unwrap();
    assert!(run.summary.success);
    assert_eq!(run.summary.total_hot_posts, 0);
    assert!(run.summary.top_posts.is_empty());
}

#[tokio::test]
async fn authorless_posts_are_skipped_not_failed() {
    let (db, _) = seeded_db(&[
        Seed {
            title: "Orphaned",
            author: None,
            views: 900,
            likes: 0,
            comments: 0,
            age_hours: 1,
        },
        simple("Owned", "b", 100, 1),
    ]);

    let run = hot_posts::run(&db, &HotPostSettings::default(), now(), false)
        .await
        .unwrap();
    assert_eq!(run.summary.notifications_sent, 1);
    assert_eq!(run.summary.notifications_skipped, 1);
    assert_eq!(run.summary.notifications_failed, 0);
}

// ============================================================
// Dispatch: a failed insert never aborts the batch
// ============================================================

/// Delegates to SQLite but refuses notifications for one recipient.
struct FlakyNotifications {
    inner: SqliteDatabase,
    reject: String,
}

#[async_trait]
impl Database for FlakyNotifications {
    async fn table_count(&self) -> Result<i64> {
        self.inner.table_count().await
    }
    async fn get_job_state(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_job_state(key).await
    }
    async fn set_job_state(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_job_state(key, value).await
    }
    async fn get_all_job_state(&self) -> Result<Vec<(String, String)>> {
        self.inner.get_all_job_state().await
    }
    async fn recent_posts(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<PostRow>> {
        self.inner.recent_posts(since, limit).await
    }
    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        self.inner.comment_counts(post_ids).await
    }
    async fn insert_notification(&self, notification: &NewNotification) -> Result<i64> {
        if notification.recipient_user_id == self.reject {
            anyhow::bail!("connection reset");
        }
        self.inner.insert_notification(notification).await
    }
    async fn notifications_since(
        &self,
        kind: Option<&NotificationKind>,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>> {
        self.inner.notifications_since(kind, since).await
    }
    async fn notification_counts(&self) -> Result<Vec<(String, i64)>> {
        self.inner.notification_counts().await
    }
    async fn get_cache_entry(
        &self,
        asset_type: AssetType,
        entity_id: i64,
    ) -> Result<Option<CacheIndexEntry>> {
        self.inner.get_cache_entry(asset_type, entity_id).await
    }
    async fn upsert_cache_entry(&self, entry: &CacheIndexEntry) -> Result<()> {
        self.inner.upsert_cache_entry(entry).await
    }
    async fn list_cache_entries(&self) -> Result<Vec<CacheIndexEntry>> {
        self.inner.list_cache_entries().await
    }
    async fn cache_status_counts(&self) -> Result<Vec<(String, String, i64)>> {
        self.inner.cache_status_counts().await
    }
}

#[tokio::test]
async fn failed_insert_is_counted_and_batch_continues() {
    let (inner, _) = seeded_db(&[
        simple("One", "a", 300, 1),
        simple("Two", "flaky", 200, 1),
        simple("Three", "c", 100, 1),
    ]);
    let db: Arc<dyn Database> = Arc::new(FlakyNotifications {
        inner,
        reject: "flaky".to_string(),
    });

    let weights = HotScoreWeights::default();
    let scored = collect(db.as_ref(), now(), 7, 100)
        .await
        .unwrap()
        .into_iter()
        .map(|s| score_snapshot(s, now(), 7, &weights))
        .collect();
    let ranked = rank(scored, 20);

    let settings = DispatchSettings {
        batch_size: 1,
        ..DispatchSettings::default()
    };
    let outcome = dispatch(db.as_ref(), &ranked, now(), &settings).await;
    assert_eq!(outcome.sent, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.skipped, 0);
}

#[tokio::test]
async fn dispatch_ignores_ranks_beyond_limit() {
    let seeds: Vec<Seed> = (0..5)
        .map(|i| Seed {
            title: "post",
            author: Some("a"),
            views: 10 * (i + 1),
            likes: 0,
            comments: 0,
            age_hours: 1,
        })
        .collect();
    let (db, _) = seeded_db(&seeds);

    let weights = HotScoreWeights::default();
    let scored = collect(&db, now(), 7, 100)
        .await
        .unwrap()
        .into_iter()
        .map(|s| score_snapshot(s, now(), 7, &weights))
        .collect();
    let ranked = rank(scored, 20);

    let settings = DispatchSettings {
        notify_max_rank: 3,
        ..DispatchSettings::default()
    };
    let outcome = dispatch(&db, &ranked, now(), &settings).await;
    assert_eq!(outcome.sent, 3);
}
