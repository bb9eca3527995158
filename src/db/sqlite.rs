// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{CacheIndexEntry, NewNotification, NotificationKind, NotificationRecord, PostRow};
use super::traits::Database;
use crate::media::asset::AssetType;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn get_job_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_job_state(&conn, key)
    }

    async fn set_job_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_job_state(&conn, key, value)
    }

    async fn get_all_job_state(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().await;
        super::queries::get_all_job_state(&conn)
    }

    async fn recent_posts(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<PostRow>> {
        let conn = self.conn.lock().await;
        super::queries::recent_posts(&conn, since, limit)
    }

    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        let conn = self.conn.lock().await;
        super::queries::comment_counts(&conn, post_ids)
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_notification(&conn, notification)
    }

    async fn notifications_since(
        &self,
        kind: Option<&NotificationKind>,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn.lock().await;
        super::queries::notifications_since(&conn, kind, since)
    }

    async fn notification_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().await;
        super::queries::notification_counts(&conn)
    }

    async fn get_cache_entry(
        &self,
        asset_type: AssetType,
        entity_id: i64,
    ) -> Result<Option<CacheIndexEntry>> {
        let conn = self.conn.lock().await;
        super::queries::get_cache_entry(&conn, asset_type, entity_id)
    }

    async fn upsert_cache_entry(&self, entry: &CacheIndexEntry) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_cache_entry(&conn, entry)
    }

    async fn list_cache_entries(&self) -> Result<Vec<CacheIndexEntry>> {
        let conn = self.conn.lock().await;
        super::queries::list_cache_entries(&conn)
    }

    async fn cache_status_counts(&self) -> Result<Vec<(String, String, i64)>> {
        let conn = self.conn.lock().await;
        super::queries::cache_status_counts(&conn)
    }
}
