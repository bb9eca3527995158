// Database layer: cached media index, notifications, job state, and the
// posts/comments the HOT collector reads.
//
// Two backends sit behind the `Database` trait: SQLite (rusqlite, bundled,
// default feature) and PostgreSQL (sqlx, `postgres` feature). The SQLite
// file lives wherever PITCHSIDE_DB_PATH points (defaults to ./pitchside.db).

pub mod models;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use traits::Database;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Storage format for timestamps in text columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC timestamp the way SQLite's datetime('now') does.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the SQLite text shape and RFC 3339.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Unrecognized timestamp: {s}"))
}

#[cfg(feature = "sqlite")]
use std::path::Path;
#[cfg(feature = "sqlite")]
use std::sync::Arc;

/// Open (or create) the SQLite database and run migrations.
///
/// Called by `pitchside init`.
#[cfg(feature = "sqlite")]
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {db_path}"))?;
        }
    }

    let conn = rusqlite::Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;

    // Enable WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}

/// Open an existing SQLite database (fails if it doesn't exist yet).
///
/// Migrations still run so an older file picks up new tables.
#[cfg(feature = "sqlite")]
pub fn open_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("Database not found at {db_path}. Run `pitchside init` first.");
    }

    let conn = rusqlite::Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::create_tables(&conn)?;

    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}

/// Connect to PostgreSQL and run pending migrations.
#[cfg(feature = "postgres")]
pub async fn connect_postgres(database_url: &str) -> Result<std::sync::Arc<dyn Database>> {
    let db = postgres::PgDatabase::connect(database_url).await?;
    Ok(std::sync::Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let s = format_timestamp(&dt);
        assert_eq!(s, "2026-03-14 15:09:26");
        assert_eq!(parse_timestamp(&s).unwrap(), dt);
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2026-03-14T15:09:26+09:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 14, 6, 9, 26).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
