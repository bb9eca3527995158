// Cache index transitions: pending -> ready | error.
//
// One row per (asset_type, entity_id). `storage_path` always points at the
// md variant, which is what read paths serve by default.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::asset::{AssetType, SizeClass};
use crate::db::models::{CacheIndexEntry, CacheStatus, VariantSet};
use crate::db::Database;

fn base_entry(
    existing: Option<CacheIndexEntry>,
    asset_type: AssetType,
    entity_id: i64,
    source_url: &str,
    now: DateTime<Utc>,
) -> CacheIndexEntry {
    let mut entry = existing.unwrap_or_else(|| CacheIndexEntry {
        asset_type,
        entity_id,
        storage_path: String::new(),
        source_url: String::new(),
        source_hash: None,
        status: CacheStatus::Pending,
        variants: VariantSet::default(),
        error_message: None,
        checked_at: now,
        updated_at: now,
    });
    entry.storage_path = asset_type.variant_path(SizeClass::Md, entity_id);
    entry.source_url = source_url.to_string();
    entry.checked_at = now;
    entry.updated_at = now;
    entry
}

async fn write(db: &dyn Database, entry: CacheIndexEntry) -> Result<CacheIndexEntry> {
    db.upsert_cache_entry(&entry).await.with_context(|| {
        format!(
            "Failed to update cache index for {} {}",
            entry.asset_type.as_str(),
            entry.entity_id
        )
    })?;
    debug!(
        asset_type = entry.asset_type.as_str(),
        entity_id = entry.entity_id,
        status = %entry.status,
        "Cache index updated"
    );
    Ok(entry)
}

/// Record that a mirror for this entity has started.
///
/// Variants already known to exist are kept.
pub async fn mark_pending(
    db: &dyn Database,
    asset_type: AssetType,
    entity_id: i64,
    source_url: &str,
    now: DateTime<Utc>,
) -> Result<CacheIndexEntry> {
    let existing = db.get_cache_entry(asset_type, entity_id).await?;
    let mut entry = base_entry(existing, asset_type, entity_id, source_url, now);
    entry.status = CacheStatus::Pending;
    entry.error_message = None;
    write(db, entry).await
}

/// Record that all three variants are in storage.
pub async fn mark_ready(
    db: &dyn Database,
    asset_type: AssetType,
    entity_id: i64,
    source_url: &str,
    source_hash: Option<String>,
    now: DateTime<Utc>,
) -> Result<CacheIndexEntry> {
    let existing = db.get_cache_entry(asset_type, entity_id).await?;
    let mut entry = base_entry(existing, asset_type, entity_id, source_url, now);
    entry.status = CacheStatus::Ready;
    entry.variants = VariantSet::all();
    if source_hash.is_some() {
        entry.source_hash = source_hash;
    }
    entry.error_message = None;
    write(db, entry).await
}

/// Record a failed mirror, along with whichever size classes did land.
pub async fn mark_error(
    db: &dyn Database,
    asset_type: AssetType,
    entity_id: i64,
    source_url: &str,
    variants_written: VariantSet,
    message: &str,
    now: DateTime<Utc>,
) -> Result<CacheIndexEntry> {
    let existing = db.get_cache_entry(asset_type, entity_id).await?;
    let mut entry = base_entry(existing, asset_type, entity_id, source_url, now);
    entry.status = CacheStatus::Error;
    entry.variants = variants_written;
    entry.error_message = Some(message.to_string());
    write(db, entry).await
}

/// Is an error row still inside its retry backoff?
pub fn in_error_backoff(entry: &CacheIndexEntry, now: DateTime<Utc>, retry_minutes: u32) -> bool {
    entry.status == CacheStatus::Error
        && now - entry.checked_at < chrono::Duration::minutes(i64::from(retry_minutes))
}
