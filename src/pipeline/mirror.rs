// Media mirroring: one entity, a list of entities, and the read-path resolver.
//
// Per entity the order is fixed: fetch, encode, the three variant uploads
// (concurrent), then exactly one index write after every upload settled.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::batch::for_each_batch;
use super::convert::BucketSummary;
use crate::config::MediaSettings;
use crate::db::models::{CacheStatus, VariantSet};
use crate::db::Database;
use crate::media::asset::{AssetType, SizeClass};
use crate::media::fetch::{FetchOutcome, Fetcher};
use crate::media::store::{write_variant, BlobStore};
use crate::media::{encode, index, probe, source, source_hash, version_tag};

/// Everything a mirror run needs, shared across tasks.
pub struct MediaContext {
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn BlobStore>,
    pub fetcher: Fetcher,
    pub settings: MediaSettings,
}

impl MediaContext {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn BlobStore>,
        settings: MediaSettings,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(settings.fetch_timeout, settings.max_fetch_bytes)?;
        Ok(Self {
            db,
            store,
            fetcher,
            settings,
        })
    }

    /// Public URL of the md variant, with a `?v=` suffix when the source hash is known.
    pub fn variant_url(&self, asset_type: AssetType, entity_id: i64, hash: Option<&str>) -> String {
        let url = self.store.public_url(
            asset_type.bucket(),
            &asset_type.variant_key(SizeClass::Md, entity_id),
        );
        match hash {
            Some(h) => format!("{url}?v={}", version_tag(h)),
            None => url,
        }
    }

    pub fn origin_url(&self, asset_type: AssetType, entity_id: i64) -> String {
        source::resolve(&self.settings.origin_base_url, asset_type, entity_id)
    }
}

/// What a single-entity mirror did.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorStatus {
    /// Index row was already `ready`; nothing fetched.
    AlreadyCached,
    /// Variants written and index marked `ready`.
    Mirrored { source_hash: String },
    /// Origin fetch timed out; callers should serve the origin URL.
    TimedOut,
}

/// Where a resolved image URL points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    /// Served from storage via a `ready` index row (or a healed one).
    Cached,
    /// Mirrored during this request.
    Mirrored,
    /// Third-party origin URL.
    Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub url: String,
    pub origin: ImageOrigin,
}

/// Encode `bytes` into all three variants, upload them, and update the index.
///
/// Every upload is attempted even if another fails. The index goes to
/// `ready` only when all three landed; otherwise it records which size
/// classes did and goes to `error`, and the first failure is returned.
pub async fn convert_and_store(
    ctx: &MediaContext,
    asset_type: AssetType,
    entity_id: i64,
    bytes: Vec<u8>,
    source_url: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let hash = source_hash(&bytes);
    let quality = ctx.settings.quality;

    // Decode and resize are CPU-bound
    let encoded = tokio::task::spawn_blocking(move || encode::encode_all(&bytes, asset_type, quality))
        .await
        .context("spawn_blocking panicked")?;

    let variants = match encoded {
        Ok(v) => v,
        Err(e) => {
            let message = format!("{e:#}");
            index::mark_error(
                ctx.db.as_ref(),
                asset_type,
                entity_id,
                source_url,
                VariantSet::default(),
                &message,
                now,
            )
            .await?;
            return Err(e);
        }
    };

    let uploads = variants.into_iter().map(|(size, data)| async move {
        let result = write_variant(ctx.store.as_ref(), asset_type, entity_id, size, data).await;
        (size, result)
    });

    let mut written = VariantSet::default();
    let mut first_error = None;
    for (size, result) in join_all(uploads).await {
        match result {
            Ok(path) => {
                debug!(path, "Variant stored");
                written.insert(size);
            }
            Err(e) => {
                warn!(
                    asset_type = asset_type.as_str(),
                    entity_id,
                    size = size.as_str(),
                    error = %e,
                    "Variant upload failed"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        None => {
            index::mark_ready(
                ctx.db.as_ref(),
                asset_type,
                entity_id,
                source_url,
                Some(hash.clone()),
                now,
            )
            .await?;
            Ok(hash)
        }
        Some(e) => {
            let message = format!("{e:#}");
            index::mark_error(
                ctx.db.as_ref(),
                asset_type,
                entity_id,
                source_url,
                written,
                &message,
                now,
            )
            .await?;
            Err(e)
        }
    }
}

/// Mirror one entity from the origin host.
///
/// A `ready` index row short-circuits. Fetch failures and timeouts are
/// recorded on the index row; only failures are returned as errors.
pub async fn mirror_entity(
    ctx: &MediaContext,
    asset_type: AssetType,
    entity_id: i64,
    now: DateTime<Utc>,
) -> Result<MirrorStatus> {
    if let Some(entry) = ctx.db.get_cache_entry(asset_type, entity_id).await? {
        if entry.status == CacheStatus::Ready {
            return Ok(MirrorStatus::AlreadyCached);
        }
    }

    let source_url = ctx.origin_url(asset_type, entity_id);
    index::mark_pending(ctx.db.as_ref(), asset_type, entity_id, &source_url, now).await?;

    let bytes = match ctx.fetcher.fetch(&source_url).await {
        Ok(FetchOutcome::Fetched(bytes)) => bytes,
        Ok(FetchOutcome::TimedOut) => {
            index::mark_error(
                ctx.db.as_ref(),
                asset_type,
                entity_id,
                &source_url,
                VariantSet::default(),
                "origin fetch timed out",
                now,
            )
            .await?;
            return Ok(MirrorStatus::TimedOut);
        }
        Err(e) => {
            index::mark_error(
                ctx.db.as_ref(),
                asset_type,
                entity_id,
                &source_url,
                VariantSet::default(),
                &format!("{e:#}"),
                now,
            )
            .await?;
            return Err(e);
        }
    };

    let source_hash =
        convert_and_store(ctx, asset_type, entity_id, bytes, &source_url, now).await?;
    info!(
        asset_type = asset_type.as_str(),
        entity_id, "Mirrored media from origin"
    );
    Ok(MirrorStatus::Mirrored { source_hash })
}

/// Mirror a list of entity ids from the origin host in bounded batches.
pub async fn mirror_many(
    ctx: &MediaContext,
    asset_type: AssetType,
    entity_ids: Vec<i64>,
    now: DateTime<Utc>,
) -> BucketSummary {
    let mut summary = BucketSummary::new(asset_type.bucket());
    summary.total = entity_ids.len();

    let pb = ProgressBar::new(entity_ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Mirroring [{bar:30}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let results = for_each_batch(
        entity_ids,
        ctx.settings.batch_size,
        ctx.settings.batch_pause,
        |entity_id| {
            let pb = pb.clone();
            async move {
                let result = mirror_entity(ctx, asset_type, entity_id, now).await;
                pb.inc(1);
                (entity_id, result)
            }
        },
    )
    .await;
    pb.finish_and_clear();

    for (entity_id, result) in results {
        match result {
            Ok(MirrorStatus::Mirrored { .. }) => summary.succeeded += 1,
            Ok(MirrorStatus::AlreadyCached) => summary.skipped += 1,
            Ok(MirrorStatus::TimedOut) => summary.timed_out += 1,
            Err(e) => {
                warn!(
                    asset_type = asset_type.as_str(),
                    entity_id,
                    error = %e,
                    "Mirror failed"
                );
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Resolve the URL a client should load for one entity's image.
///
/// Order: ready index row, error backoff, storage probe of all three size
/// classes (heals the index),
/// synchronous mirror. Anything that fails after the index lookup degrades
/// to the origin URL.
pub async fn resolve_image_url(
    ctx: &MediaContext,
    asset_type: AssetType,
    entity_id: i64,
    now: DateTime<Utc>,
) -> Result<ResolvedImage> {
    let origin = || ResolvedImage {
        url: ctx.origin_url(asset_type, entity_id),
        origin: ImageOrigin::Origin,
    };

    let entry = ctx
        .db
        .get_cache_entry(asset_type, entity_id)
        .await
        .context("Failed to read cache index")?;

    if let Some(entry) = &entry {
        if entry.status == CacheStatus::Ready {
            return Ok(ResolvedImage {
                url: ctx.variant_url(asset_type, entity_id, entry.source_hash.as_deref()),
                origin: ImageOrigin::Cached,
            });
        }
        if index::in_error_backoff(entry, now, ctx.settings.error_retry_minutes) {
            debug!(
                asset_type = asset_type.as_str(),
                entity_id, "Cache entry in error backoff, serving origin"
            );
            return Ok(origin());
        }
    }

    // Heal only when every size class is in storage; a partial set re-mirrors
    match probe::probe_all(ctx.store.as_ref(), asset_type, entity_id).await {
        Ok(present) if present.is_complete() => {
            let source_url = ctx.origin_url(asset_type, entity_id);
            let healed =
                index::mark_ready(ctx.db.as_ref(), asset_type, entity_id, &source_url, None, now)
                    .await?;
            return Ok(ResolvedImage {
                url: ctx.variant_url(asset_type, entity_id, healed.source_hash.as_deref()),
                origin: ImageOrigin::Cached,
            });
        }
        Ok(present) => {
            debug!(
                asset_type = asset_type.as_str(),
                entity_id,
                sm = present.sm,
                md = present.md,
                lg = present.lg,
                "Variant set incomplete in storage, mirroring"
            );
        }
        Err(e) => {
            warn!(
                asset_type = asset_type.as_str(),
                entity_id,
                error = %e,
                "Storage probe failed, serving origin"
            );
            return Ok(origin());
        }
    }

    match mirror_entity(ctx, asset_type, entity_id, now).await {
        Ok(MirrorStatus::Mirrored { source_hash }) => Ok(ResolvedImage {
            url: ctx.variant_url(asset_type, entity_id, Some(&source_hash)),
            origin: ImageOrigin::Mirrored,
        }),
        // Another writer finished between the lookup and the mirror
        Ok(MirrorStatus::AlreadyCached) => Ok(ResolvedImage {
            url: ctx.variant_url(asset_type, entity_id, None),
            origin: ImageOrigin::Cached,
        }),
        Ok(MirrorStatus::TimedOut) => Ok(origin()),
        Err(e) => {
            warn!(
                asset_type = asset_type.as_str(),
                entity_id,
                error = %e,
                "Mirror on read failed, serving origin"
            );
            Ok(origin())
        }
    }
}
