// PgDatabase: PostgreSQL backend implementing the Database trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time.
//
// Key differences from SQLite:
// - TIMESTAMPTZ instead of TEXT for timestamps
// - JSONB for notification metadata
// - BOOLEAN moderation flags
// - $1/$2 parameter syntax and `= ANY($1)` for id lists

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::{PgRow, Postgres};

use super::models::{
    CacheIndexEntry, CacheStatus, NewNotification, NotificationKind, NotificationRecord, PostRow,
    VariantSet,
};
use super::traits::Database;
use crate::media::asset::AssetType;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    ///
    /// Holds a session-level advisory lock on a dedicated connection so two
    /// job instances starting together don't race to apply the same
    /// migration. The unlock always runs, even when a migration fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "PITCHSID" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x5049544348534944_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [
                (1, include_str!("../../migrations/postgres/0001_initial.sql")),
                (
                    2,
                    include_str!("../../migrations/postgres/0002_asset_cache_status.sql"),
                ),
            ];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    // Schema change and schema_version insert commit together.
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Migration v{version} failed"))?;
                    tx.commit().await?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        // Migration error takes priority over unlock error.
        migration_result?;
        unlock_result?;

        Ok(())
    }
}

fn cache_entry_from_row(row: &PgRow) -> Result<CacheIndexEntry> {
    let asset_type: String = row.get("asset_type");
    let status: String = row.get("status");
    Ok(CacheIndexEntry {
        asset_type: AssetType::parse(&asset_type)
            .with_context(|| format!("Unknown asset type in cache index: {asset_type}"))?,
        entity_id: row.get("entity_id"),
        storage_path: row.get("storage_path"),
        source_url: row.get("source_url"),
        source_hash: row.get("source_hash"),
        status: CacheStatus::parse(&status)
            .with_context(|| format!("Unknown cache status: {status}"))?,
        variants: VariantSet {
            sm: row.get("sm_ready"),
            md: row.get("md_ready"),
            lg: row.get("lg_ready"),
        },
        error_message: row.get("error_message"),
        checked_at: row.get("checked_at"),
        updated_at: row.get("updated_at"),
    })
}

const CACHE_COLUMNS: &str = "asset_type, entity_id, storage_path, source_url, source_hash, status,
     sm_ready, md_ready, lg_ready, error_message, checked_at, updated_at";

#[async_trait]
impl Database for PgDatabase {
    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn get_job_state(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx_core::query::query("SELECT value FROM job_state WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn set_job_state(&self, key: &str, value: &str) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO job_state (key, value, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT(key) DO UPDATE SET value = $2, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_all_job_state(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx_core::query::query("SELECT key, value FROM job_state ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>(0), r.get::<String, _>(1)))
            .collect())
    }

    async fn recent_posts(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<PostRow>> {
        let rows = sqlx_core::query::query(
            "SELECT id, board_slug, title, author_id, views, likes, created_at
             FROM posts
             WHERE created_at >= $1 AND NOT is_deleted AND NOT is_hidden
             ORDER BY views + likes * 10 DESC, created_at DESC
             LIMIT $2",
        )
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to read recent posts")?;

        Ok(rows
            .iter()
            .map(|r| PostRow {
                id: r.get("id"),
                board_slug: r.get("board_slug"),
                title: r.get("title"),
                author_id: r.get("author_id"),
                views: r.get::<i64, _>("views").max(0) as u64,
                likes: r.get::<i64, _>("likes").max(0) as u64,
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx_core::query::query(
            "SELECT post_id, COUNT(*)::bigint FROM comments
             WHERE post_id = ANY($1) AND NOT is_deleted AND NOT is_hidden
             GROUP BY post_id",
        )
        .bind(post_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .context("Failed to count comments")?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<i64, _>(0), r.get::<i64, _>(1).max(0) as u64))
            .collect())
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<i64> {
        let row = sqlx_core::query::query(
            "INSERT INTO notifications
                (recipient_user_id, kind, title, body, link, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(&notification.recipient_user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.link)
        .bind(&notification.metadata)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn notifications_since(
        &self,
        kind: Option<&NotificationKind>,
        since: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx_core::query::query(
            "SELECT id, recipient_user_id, kind, title, body, link, metadata, created_at
             FROM notifications
             WHERE created_at >= $1 AND ($2::text IS NULL OR kind = $2)
             ORDER BY created_at, id",
        )
        .bind(since)
        .bind(kind.map(|k| k.as_str().to_string()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| NotificationRecord {
                id: r.get("id"),
                recipient_user_id: r.get("recipient_user_id"),
                kind: NotificationKind::parse(&r.get::<String, _>("kind")),
                title: r.get("title"),
                body: r.get("body"),
                link: r.get("link"),
                metadata: r.get("metadata"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn notification_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx_core::query::query(
            "SELECT kind, COUNT(*)::bigint FROM notifications GROUP BY kind ORDER BY kind",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>(0), r.get::<i64, _>(1)))
            .collect())
    }

    async fn get_cache_entry(
        &self,
        asset_type: AssetType,
        entity_id: i64,
    ) -> Result<Option<CacheIndexEntry>> {
        let sql = format!(
            "SELECT {CACHE_COLUMNS} FROM asset_cache WHERE asset_type = $1 AND entity_id = $2"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(asset_type.as_str())
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(cache_entry_from_row).transpose()
    }

    async fn upsert_cache_entry(&self, entry: &CacheIndexEntry) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO asset_cache
                (asset_type, entity_id, storage_path, source_url, source_hash, status,
                 sm_ready, md_ready, lg_ready, error_message, checked_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT(asset_type, entity_id) DO UPDATE SET
                storage_path = $3,
                source_url = $4,
                source_hash = $5,
                status = $6,
                sm_ready = $7,
                md_ready = $8,
                lg_ready = $9,
                error_message = $10,
                checked_at = $11,
                updated_at = $12",
        )
        .bind(entry.asset_type.as_str())
        .bind(entry.entity_id)
        .bind(&entry.storage_path)
        .bind(&entry.source_url)
        .bind(&entry.source_hash)
        .bind(entry.status.as_str())
        .bind(entry.variants.sm)
        .bind(entry.variants.md)
        .bind(entry.variants.lg)
        .bind(&entry.error_message)
        .bind(entry.checked_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_cache_entries(&self) -> Result<Vec<CacheIndexEntry>> {
        let sql = format!("SELECT {CACHE_COLUMNS} FROM asset_cache ORDER BY asset_type, entity_id");
        let rows = sqlx_core::query::query(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(cache_entry_from_row).collect()
    }

    async fn cache_status_counts(&self) -> Result<Vec<(String, String, i64)>> {
        let rows = sqlx_core::query::query(
            "SELECT asset_type, status, COUNT(*)::bigint FROM asset_cache
             GROUP BY asset_type, status
             ORDER BY asset_type, status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| {
                (
                    r.get::<String, _>(0),
                    r.get::<String, _>(1),
                    r.get::<i64, _>(2),
                )
            })
            .collect())
    }
}
