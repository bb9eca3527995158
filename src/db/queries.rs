// Database queries: CRUD operations for all tables.
//
// Every SQLite interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.
//
// Timestamps are stored as "YYYY-MM-DD HH:MM:SS" UTC text (the same shape
// SQLite's datetime('now') produces), so string comparison is time order.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};

use super::models::{
    CacheIndexEntry, CacheStatus, NewNotification, NotificationKind, NotificationRecord, PostRow,
    VariantSet,
};
use super::{format_timestamp, parse_timestamp};
use crate::media::asset::AssetType;

// --- Job state ---

/// Get a job state value by key (e.g., "hot_posts_last_run_at").
pub fn get_job_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM job_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a job state value (upsert).
pub fn set_job_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO job_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Every job state entry, ordered by key.
pub fn get_all_job_state(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM job_state ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

// --- Posts and comments ---

/// Insert a post. The community app owns this table; the crate writes to it
/// only when seeding a standalone database.
pub fn insert_post(
    conn: &Connection,
    board_slug: &str,
    title: &str,
    author_id: Option<&str>,
    views: u64,
    likes: u64,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO posts (board_slug, title, author_id, views, likes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            board_slug,
            title,
            author_id,
            views as i64,
            likes as i64,
            format_timestamp(&created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Set a post's moderation flags.
pub fn set_post_flags(conn: &Connection, post_id: i64, deleted: bool, hidden: bool) -> Result<()> {
    conn.execute(
        "UPDATE posts SET is_deleted = ?2, is_hidden = ?3 WHERE id = ?1",
        params![post_id, deleted as i32, hidden as i32],
    )?;
    Ok(())
}

/// Insert a comment on a post.
pub fn insert_comment(
    conn: &Connection,
    post_id: i64,
    author_id: Option<&str>,
    content: &str,
    deleted: bool,
    hidden: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, content, is_deleted, is_hidden)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post_id, author_id, content, deleted as i32, hidden as i32],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Visible posts created at or after `since`, most engaged first, capped at `limit`.
pub fn recent_posts(conn: &Connection, since: DateTime<Utc>, limit: u32) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, board_slug, title, author_id, views, likes, created_at
         FROM posts
         WHERE created_at >= ?1 AND is_deleted = 0 AND is_hidden = 0
         ORDER BY views + likes * 10 DESC, created_at DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![format_timestamp(&since), limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut posts = Vec::new();
    for row in rows {
        let (id, board_slug, title, author_id, views, likes, created_at) = row?;
        posts.push(PostRow {
            id,
            board_slug,
            title,
            author_id,
            views: views.max(0) as u64,
            likes: likes.max(0) as u64,
            created_at: parse_timestamp(&created_at)
                .with_context(|| format!("Bad created_at on post {id}"))?,
        });
    }
    Ok(posts)
}

/// Visible comment counts for the given posts. Posts without visible
/// comments are absent from the map.
pub fn comment_counts(conn: &Connection, post_ids: &[i64]) -> Result<HashMap<i64, u64>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; post_ids.len()].join(", ");
    let sql = format!(
        "SELECT post_id, COUNT(*) FROM comments
         WHERE post_id IN ({placeholders}) AND is_deleted = 0 AND is_hidden = 0
         GROUP BY post_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(post_ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (post_id, count) = row?;
        counts.insert(post_id, count.max(0) as u64);
    }
    Ok(counts)
}

// --- Notifications ---

/// Write a notification and return its ID.
pub fn insert_notification(conn: &Connection, notification: &NewNotification) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications
            (recipient_user_id, kind, title, body, link, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.recipient_user_id,
            notification.kind.as_str(),
            notification.title,
            notification.body,
            notification.link,
            serde_json::to_string(&notification.metadata)?,
            format_timestamp(&notification.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Notifications created at or after `since`, optionally restricted to one kind.
pub fn notifications_since(
    conn: &Connection,
    kind: Option<&NotificationKind>,
    since: DateTime<Utc>,
) -> Result<Vec<NotificationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_user_id, kind, title, body, link, metadata, created_at
         FROM notifications
         WHERE created_at >= ?1 AND (?2 IS NULL OR kind = ?2)
         ORDER BY created_at, id",
    )?;

    let rows = stmt.query_map(
        params![format_timestamp(&since), kind.map(|k| k.as_str())],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        },
    )?;

    let mut records = Vec::new();
    for row in rows {
        let (id, recipient_user_id, kind, title, body, link, metadata, created_at) = row?;
        records.push(NotificationRecord {
            id,
            recipient_user_id,
            kind: NotificationKind::parse(&kind),
            title,
            body,
            link,
            // Rows written by other surfaces may carry malformed metadata;
            // they simply don't match any post during dedup.
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(records)
}

/// Notification totals per kind.
pub fn notification_counts(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT kind, COUNT(*) FROM notifications GROUP BY kind ORDER BY kind")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

// --- Asset cache index ---

const CACHE_COLUMNS: &str = "asset_type, entity_id, storage_path, source_url, source_hash, status,
     sm_ready, md_ready, lg_ready, error_message, checked_at, updated_at";

fn cache_entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCacheRow> {
    Ok(RawCacheRow {
        asset_type: row.get(0)?,
        entity_id: row.get(1)?,
        storage_path: row.get(2)?,
        source_url: row.get(3)?,
        source_hash: row.get(4)?,
        status: row.get(5)?,
        sm_ready: row.get::<_, i32>(6)? != 0,
        md_ready: row.get::<_, i32>(7)? != 0,
        lg_ready: row.get::<_, i32>(8)? != 0,
        error_message: row.get(9)?,
        checked_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Row as stored, before enum and timestamp parsing.
struct RawCacheRow {
    asset_type: String,
    entity_id: i64,
    storage_path: String,
    source_url: String,
    source_hash: Option<String>,
    status: String,
    sm_ready: bool,
    md_ready: bool,
    lg_ready: bool,
    error_message: Option<String>,
    checked_at: String,
    updated_at: String,
}

impl RawCacheRow {
    fn into_entry(self) -> Result<CacheIndexEntry> {
        let asset_type = AssetType::parse(&self.asset_type)
            .with_context(|| format!("Unknown asset type in cache index: {}", self.asset_type))?;
        let status = CacheStatus::parse(&self.status)
            .with_context(|| format!("Unknown cache status: {}", self.status))?;
        Ok(CacheIndexEntry {
            asset_type,
            entity_id: self.entity_id,
            storage_path: self.storage_path,
            source_url: self.source_url,
            source_hash: self.source_hash,
            status,
            variants: VariantSet {
                sm: self.sm_ready,
                md: self.md_ready,
                lg: self.lg_ready,
            },
            error_message: self.error_message,
            checked_at: parse_timestamp(&self.checked_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Look up the index row for one entity.
pub fn get_cache_entry(
    conn: &Connection,
    asset_type: AssetType,
    entity_id: i64,
) -> Result<Option<CacheIndexEntry>> {
    let sql = format!(
        "SELECT {CACHE_COLUMNS} FROM asset_cache WHERE asset_type = ?1 AND entity_id = ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_row(params![asset_type.as_str(), entity_id], cache_entry_from_row)
        .optional()?;
    raw.map(RawCacheRow::into_entry).transpose()
}

/// Insert or replace the index row for `(asset_type, entity_id)`.
pub fn upsert_cache_entry(conn: &Connection, entry: &CacheIndexEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO asset_cache
            (asset_type, entity_id, storage_path, source_url, source_hash, status,
             sm_ready, md_ready, lg_ready, error_message, checked_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(asset_type, entity_id) DO UPDATE SET
            storage_path = ?3,
            source_url = ?4,
            source_hash = ?5,
            status = ?6,
            sm_ready = ?7,
            md_ready = ?8,
            lg_ready = ?9,
            error_message = ?10,
            checked_at = ?11,
            updated_at = ?12",
        params![
            entry.asset_type.as_str(),
            entry.entity_id,
            entry.storage_path,
            entry.source_url,
            entry.source_hash,
            entry.status.as_str(),
            entry.variants.sm as i32,
            entry.variants.md as i32,
            entry.variants.lg as i32,
            entry.error_message,
            format_timestamp(&entry.checked_at),
            format_timestamp(&entry.updated_at),
        ],
    )?;
    Ok(())
}

/// Every index row, for migration and reporting.
pub fn list_cache_entries(conn: &Connection) -> Result<Vec<CacheIndexEntry>> {
    let sql = format!("SELECT {CACHE_COLUMNS} FROM asset_cache ORDER BY asset_type, entity_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], cache_entry_from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

/// Row counts grouped by asset type and status.
pub fn cache_status_counts(conn: &Connection) -> Result<Vec<(String, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT asset_type, status, COUNT(*) FROM asset_cache
         GROUP BY asset_type, status
         ORDER BY asset_type, status",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

// rusqlite's optional() helper: converts "no rows" into None
use rusqlite::OptionalExtension;
