// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite or sqlx directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::asset::{AssetType, SizeClass};

/// A post row joined with its engagement counters, as read by the collector.
///
/// Comment counts are resolved separately (see `Database::comment_counts`)
/// because they come from a different table with its own visibility flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRow {
    pub id: i64,
    pub board_slug: String,
    pub title: String,
    /// Author user id. Posts imported from external feeds have no author.
    pub author_id: Option<String>,
    pub views: u64,
    pub likes: u64,
    pub created_at: DateTime<Utc>,
}

/// Kind of a notification row. Only `HotPost` is written by this crate;
/// other kinds are produced by the rest of the platform and round-trip
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    HotPost,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::HotPost => "hot_post",
            NotificationKind::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "hot_post" => NotificationKind::HotPost,
            other => NotificationKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification about to be written. `created_at` is supplied by the
/// caller so a run's records share one injected clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A persisted notification. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub recipient_user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// The post this notification refers to, if its metadata carries one.
    pub fn post_id(&self) -> Option<i64> {
        self.metadata.get("post_id")?.as_i64()
    }

    /// Copy without the id, for re-inserting into another backend.
    pub fn to_new(&self) -> NewNotification {
        NewNotification {
            recipient_user_id: self.recipient_user_id.clone(),
            kind: self.kind.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            link: self.link.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }
}

/// Lifecycle of a cache index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStatus {
    Pending,
    Ready,
    Error,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Pending => "pending",
            CacheStatus::Ready => "ready",
            CacheStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CacheStatus::Pending),
            "ready" => Some(CacheStatus::Ready),
            "error" => Some(CacheStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which size classes of an entity are known to exist in storage.
///
/// A `ready` row always has all three; an `error` row may have any subset
/// when some uploads landed before another failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSet {
    pub sm: bool,
    pub md: bool,
    pub lg: bool,
}

impl VariantSet {
    pub fn all() -> Self {
        Self {
            sm: true,
            md: true,
            lg: true,
        }
    }

    pub fn insert(&mut self, size: SizeClass) {
        match size {
            SizeClass::Sm => self.sm = true,
            SizeClass::Md => self.md = true,
            SizeClass::Lg => self.lg = true,
        }
    }

    pub fn contains(&self, size: SizeClass) -> bool {
        match size {
            SizeClass::Sm => self.sm,
            SizeClass::Md => self.md,
            SizeClass::Lg => self.lg,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.sm && self.md && self.lg
    }

    pub fn is_empty(&self) -> bool {
        !(self.sm || self.md || self.lg)
    }
}

/// One row of the `asset_cache` index, unique on `(asset_type, entity_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheIndexEntry {
    pub asset_type: AssetType,
    pub entity_id: i64,
    /// Object path of the `md` variant, e.g. `teams/md/33.webp`.
    pub storage_path: String,
    pub source_url: String,
    /// SHA-256 of the source bytes the variants were built from.
    pub source_hash: Option<String>,
    pub status: CacheStatus,
    pub variants: VariantSet,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
