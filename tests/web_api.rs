// HTTP surface tests: drive the Axum router in-process with tower's oneshot.
//
// Covers bearer auth on the job trigger, overlap refusal, recovery after an
// abandoned request, the camelCase summary body, and the image resolver.

#![cfg(all(feature = "web", feature = "sqlite"))]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tower::ServiceExt;

use pitchside::config::Config;
use pitchside::db::models::{
    CacheIndexEntry, NewNotification, NotificationKind, NotificationRecord, PostRow,
};
use pitchside::db::schema::create_tables;
use pitchside::db::sqlite::SqliteDatabase;
use pitchside::db::Database;
use pitchside::media::asset::AssetType;
use pitchside::media::index;
use pitchside::media::store::LocalBlobStore;
use pitchside::pipeline::mirror::MediaContext;
use pitchside::web::{build_router, AppState};

const SECRET: &str = "scheduler-secret";

fn state(media_root: &std::path::Path, secret: &str) -> AppState {
    let conn = Connection::open_in_memory().unwrap();
    create_tables(&conn).unwrap();
    state_with_db(media_root, secret, Arc::new(SqliteDatabase::new(conn)))
}

fn state_with_db(media_root: &std::path::Path, secret: &str, db: Arc<dyn Database>) -> AppState {
    let secret = secret.to_string();
    let config = Config::from_lookup(|key| match key {
        "PITCHSIDE_JOB_SECRET" => Some(secret.clone()),
        _ => None,
    })
    .unwrap();

    let store = Arc::new(LocalBlobStore::new(media_root, "/media"));
    let media = MediaContext::new(db, store, config.media.clone()).unwrap();
    AppState::new(config, Arc::new(media))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn trigger(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/jobs/hot-posts");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

// ============================================================
// Health and auth
// ============================================================

#[tokio::test]
async fn health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(state(dir.path(), SECRET));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn job_trigger_requires_bearer_secret() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(state(dir.path(), SECRET));

    let missing = app.clone().oneshot(trigger(None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["error"], "Unauthorized");

    let wrong = app.clone().oneshot(trigger(Some("nope"))).await.unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let status = app
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unset_secret_rejects_everyone() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(state(dir.path(), ""));
    let response = app.oneshot(trigger(Some(""))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================
// HOT-post trigger
// ============================================================

#[tokio::test]
async fn authorized_trigger_returns_camel_case_summary() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path(), SECRET);
    let app = build_router(state.clone());

    let response = app.oneshot(trigger(Some(SECRET))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["totalHotPosts"], 0);
    assert_eq!(body["notificationsSent"], 0);
    assert!(body["topPosts"].as_array().unwrap().is_empty());

    let job = state.hot_job.read().await;
    assert!(!job.running);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn overlapping_trigger_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path(), SECRET);
    state.hot_job.write().await.running = true;

    let response = build_router(state).oneshot(trigger(Some(SECRET))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["success"], false);
}

/// SQLite backend whose post scan takes a while, so a run outlives a
/// short client timeout.
struct SlowPosts {
    inner: SqliteDatabase,
    delay: Duration,
}

#[async_trait]
impl Database for SlowPosts {
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
        tokio::time::sleep(self.delay).await;
        self.inner.recent_posts(since, limit).await
    }
    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        self.inner.comment_counts(post_ids).await
    }
    async fn insert_notification(&self, notification: &NewNotification) -> Result<i64> {
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
async fn abandoned_trigger_does_not_wedge_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    create_tables(&conn).unwrap();
    let db = Arc::new(SlowPosts {
        inner: SqliteDatabase::new(conn),
        delay: Duration::from_millis(300),
    });
    let state = state_with_db(dir.path(), SECRET, db);
    let app = build_router(state.clone());

    // Client gives up while the run is still collecting
    let first = tokio::time::timeout(
        Duration::from_millis(50),
        app.clone().oneshot(trigger(Some(SECRET))),
    )
    .await;
    assert!(first.is_err());

    let mut waited = Duration::ZERO;
    while state.hot_job.read().await.running {
        assert!(waited < Duration::from_secs(5), "job status never cleared");
        tokio::time::sleep(Duration::from_millis(25)).await;
        waited += Duration::from_millis(25);
    }
    assert!(state.hot_job.read().await.finished_at.is_some());

    let second = app.oneshot(trigger(Some(SECRET))).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
}

// ============================================================
// Image resolver
// ============================================================

#[tokio::test]
async fn unknown_bucket_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(state(dir.path(), SECRET));
    let response = app
        .oneshot(Request::get("/api/images/stadiums/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ready_entry_resolves_to_variant_url() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path(), SECRET);
    index::mark_ready(
        state.db.as_ref(),
        AssetType::TeamLogo,
        33,
        "https://origin.test/teams/33.png",
        Some("abcdef0123456789".to_string()),
        Utc::now(),
    )
    .await
    .unwrap();

    let response = build_router(state)
        .oneshot(Request::get("/api/images/teams/33").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["url"], "/media/teams/md/33.webp?v=abcdef012345");
    assert_eq!(body["origin"], "cached");
}
