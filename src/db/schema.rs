// Database schema: table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.
//
// `posts` and `comments` belong to the wider community app. They are created
// here with IF NOT EXISTS so a standalone database (dev, tests) has the
// columns the collector reads.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent: safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Board posts with their engagement counters
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            board_slug TEXT NOT NULL,
            title TEXT NOT NULL,
            author_id TEXT,                    -- NULL for imported/system posts
            views INTEGER NOT NULL DEFAULT 0,
            likes INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_hidden INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            author_id TEXT,
            content TEXT NOT NULL DEFAULT '',
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_hidden INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Per-user notifications; rows are never updated
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_user_id TEXT NOT NULL,
            kind TEXT NOT NULL,                -- 'hot_post', or kinds written elsewhere
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            link TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}', -- JSON: post_id, rank, score, ...
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Mirrored media cache index, one row per (asset_type, entity_id)
        CREATE TABLE IF NOT EXISTS asset_cache (
            asset_type TEXT NOT NULL,          -- team_logo / league_logo / ...
            entity_id INTEGER NOT NULL,
            storage_path TEXT NOT NULL,        -- md variant, e.g. teams/md/33.webp
            source_url TEXT NOT NULL,
            source_hash TEXT,                  -- sha256 of the source bytes
            status TEXT NOT NULL,              -- pending / ready / error
            sm_ready INTEGER NOT NULL DEFAULT 0,
            md_ready INTEGER NOT NULL DEFAULT 0,
            lg_ready INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            checked_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (asset_type, entity_id)
        );

        -- Job state: last-run timestamps and summaries
        CREATE TABLE IF NOT EXISTS job_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Collector window scan
        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        -- Comment count aggregation
        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id);

        -- Delivery-log lookups for deduplication
        CREATE INDEX IF NOT EXISTS idx_notifications_kind_created
            ON notifications(kind, created_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: cache index status lookups for `status` and bulk jobs.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_asset_cache_status ON asset_cache(status);",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count user-created tables (excludes SQLite internals).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert_eq!(table_count(&conn).unwrap(), 6);

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 2);
    }
}
