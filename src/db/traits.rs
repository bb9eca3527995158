// Database trait: backend-agnostic async interface for all DB operations.
//
// Implementors: SqliteDatabase (wraps rusqlite), PgDatabase (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{CacheIndexEntry, NewNotification, NotificationKind, NotificationRecord, PostRow};
use crate::media::asset::AssetType;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Job state ---

    /// Get a job state value by key (e.g., "hot_posts_last_run_at").
    async fn get_job_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a job state value (upsert).
    async fn set_job_state(&self, key: &str, value: &str) -> Result<()>;

    /// Get all job state entries (for migration and status).
    async fn get_all_job_state(&self) -> Result<Vec<(String, String)>>;

    // --- Posts ---

    /// Visible posts created at or after `since`, pre-ordered by
    /// `views + likes*10` descending and capped at `limit`.
    async fn recent_posts(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<PostRow>>;

    /// Visible comment counts keyed by post id. Posts with no visible
    /// comments are absent.
    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, u64>>;

    // --- Notifications ---

    /// Write a notification and return its ID.
    async fn insert_notification(&self, notification: &NewNotification) -> Result<i64>;

    /// Notifications created at or after `since`, optionally of one kind.
    async fn notifications_since(
        &self,
        kind: Option<&NotificationKind>,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>>;

    /// Notification totals per kind.
    async fn notification_counts(&self) -> Result<Vec<(String, i64)>>;

    // --- Asset cache index ---

    /// Look up the index row for one entity.
    async fn get_cache_entry(
        &self,
        asset_type: AssetType,
        entity_id: i64,
    ) -> Result<Option<CacheIndexEntry>>;

    /// Insert or replace the index row for `(asset_type, entity_id)`.
    async fn upsert_cache_entry(&self, entry: &CacheIndexEntry) -> Result<()>;

    /// Every index row.
    async fn list_cache_entries(&self) -> Result<Vec<CacheIndexEntry>>;

    /// Row counts as (asset_type, status, count).
    async fn cache_status_counts(&self) -> Result<Vec<(String, String, i64)>>;
}
