// Bulk conversion of legacy originals into WebP variants.
//
// Each bucket root holds `{entity_id}.png` originals uploaded before variants
// existed. For every numeric original missing any size-class variant: read it
// from the store, encode, upload the three variants, update the index.
// Anything at the root that is not `<digits>.png` is ignored.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use regex_lite::Regex;
use serde::Serialize;
use tracing::{info, warn};

use super::batch::for_each_batch;
use super::mirror::{convert_and_store, MediaContext};
use crate::db::models::VariantSet;
use crate::media::asset::{AssetType, SizeClass, ORIGINAL_FORMAT, VARIANT_FORMAT};
use crate::media::index;

/// Per-bucket tallies for a bulk job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub bucket: String,
    /// Entities considered (numeric originals, or ids passed to a backfill)
    pub total: usize,
    pub succeeded: usize,
    /// Already converted or already `ready`
    pub skipped: usize,
    pub failed: usize,
    /// Origin fetch timeouts (backfill only)
    pub timed_out: usize,
}

impl BucketSummary {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    /// Share of entities that ended up converted or already present.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.succeeded + self.skipped) as f64 / self.total as f64 * 100.0
    }
}

/// Entity ids of `<digits>.png` names, in listing order.
pub fn original_ids(names: &[String]) -> Result<Vec<i64>> {
    let pattern = Regex::new(r"^(\d+)\.png$").context("Invalid original filename pattern")?;
    Ok(names
        .iter()
        .filter_map(|name| pattern.captures(name))
        .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect())
}

/// Convert every pending original in one bucket.
///
/// An original is pending unless all three size classes are already in
/// storage. A listing failure is fatal for the bucket; per-entity failures
/// are logged, recorded on the index row, and counted.
pub async fn convert_bucket(
    ctx: &MediaContext,
    asset_type: AssetType,
    now: DateTime<Utc>,
) -> Result<BucketSummary> {
    let bucket = asset_type.bucket();
    let names = ctx
        .store
        .list(bucket, "", None)
        .await
        .with_context(|| format!("Failed to list bucket {bucket}"))?;
    let ids = original_ids(&names)?;

    let mut converted: Vec<HashSet<String>> = Vec::with_capacity(SizeClass::ALL.len());
    for size in SizeClass::ALL {
        let listed = ctx
            .store
            .list(bucket, size.as_str(), None)
            .await
            .with_context(|| format!("Failed to list {bucket}/{size}"))?;
        converted.push(listed.into_iter().collect());
    }

    let mut summary = BucketSummary::new(bucket);
    summary.total = ids.len();

    let pending: Vec<i64> = ids
        .into_iter()
        .filter(|id| {
            let file_name = format!("{id}.{VARIANT_FORMAT}");
            !converted.iter().all(|names| names.contains(&file_name))
        })
        .collect();
    summary.skipped = summary.total - pending.len();

    info!(
        bucket,
        originals = summary.total,
        pending = pending.len(),
        "Converting bucket"
    );

    let pb = ProgressBar::with_draw_target(Some(pending.len() as u64), ProgressDrawTarget::stdout());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {prefix:<8} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_prefix(bucket.to_string());

    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let (total, skipped) = (summary.total, summary.skipped);
    let progress_message = move |done: usize, failed: usize| {
        let rate = if total == 0 {
            100.0
        } else {
            (done + skipped) as f64 / total as f64 * 100.0
        };
        format!("ok {done} skip {skipped} err {failed} ({rate:.1}%)")
    };
    pb.set_message(progress_message(0, 0));

    let results = for_each_batch(
        pending,
        ctx.settings.batch_size,
        ctx.settings.batch_pause,
        |entity_id| {
            let pb = pb.clone();
            let (succeeded, failed, progress_message) = (&succeeded, &failed, &progress_message);
            async move {
                let result = convert_original(ctx, asset_type, entity_id, now).await;
                match &result {
                    Ok(()) => succeeded.fetch_add(1, Ordering::Relaxed),
                    Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                };
                pb.set_message(progress_message(
                    succeeded.load(Ordering::Relaxed),
                    failed.load(Ordering::Relaxed),
                ));
                pb.inc(1);
                (entity_id, result)
            }
        },
    )
    .await;
    pb.finish_and_clear();

    for (entity_id, result) in results {
        match result {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                warn!(bucket, entity_id, error = %e, "Conversion failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

async fn convert_original(
    ctx: &MediaContext,
    asset_type: AssetType,
    entity_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let bucket = asset_type.bucket();
    let key = format!("{entity_id}.{ORIGINAL_FORMAT}");
    let source_url = ctx.store.public_url(bucket, &key);

    let bytes = match ctx.store.get(bucket, &key).await {
        Ok(bytes) => bytes,
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

    convert_and_store(ctx, asset_type, entity_id, bytes, &source_url, now).await?;
    Ok(())
}

/// Convert the given buckets in order, handing each summary to `on_bucket`
/// as soon as its bucket finishes. Stops at the first listing failure.
pub async fn run<F>(
    ctx: &MediaContext,
    buckets: &[AssetType],
    now: DateTime<Utc>,
    mut on_bucket: F,
) -> Result<Vec<BucketSummary>>
where
    F: FnMut(&BucketSummary),
{
    let mut summaries = Vec::with_capacity(buckets.len());
    for &asset_type in buckets {
        let summary = convert_bucket(ctx, asset_type, now).await?;
        on_bucket(&summary);
        summaries.push(summary);
    }
    Ok(summaries)
}
