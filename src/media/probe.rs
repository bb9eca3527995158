// Storage existence probe for a single variant.

use anyhow::{Context, Result};

use super::asset::{AssetType, SizeClass, VARIANT_FORMAT};
use crate::db::models::VariantSet;
use super::store::BlobStore;

/// Does `{bucket}/{size}/{entity_id}.webp` already exist?
///
/// Lists the size-class folder with the filename as search term and checks
/// for an exact match, so `33.webp` never matches `330.webp`.
pub async fn probe(
    store: &dyn BlobStore,
    asset_type: AssetType,
    entity_id: i64,
    size: SizeClass,
) -> Result<bool> {
    let file_name = format!("{entity_id}.{VARIANT_FORMAT}");
    let names = store
        .list(asset_type.bucket(), size.as_str(), Some(&file_name))
        .await
        .with_context(|| format!("Failed to probe {}/{size}/{file_name}", asset_type.bucket()))?;
    Ok(names.iter().any(|name| name == &file_name))
}

/// Which size classes of one entity exist in storage.
pub async fn probe_all(
    store: &dyn BlobStore,
    asset_type: AssetType,
    entity_id: i64,
) -> Result<VariantSet> {
    let mut present = VariantSet::default();
    for size in SizeClass::ALL {
        if probe(store, asset_type, entity_id, size).await? {
            present.insert(size);
        }
    }
    Ok(present)
}
