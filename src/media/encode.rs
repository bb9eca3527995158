// Variant encoding: decode once, fit each size class's bounding box, emit
// lossy WebP.
//
// Sources smaller than a bound are re-encoded at their own size. Aspect ratio
// is always preserved.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;

use super::asset::{AssetType, SizeClass};

/// Default WebP quality (0-100).
pub const DEFAULT_QUALITY: u8 = 80;

/// Target dimensions for a `width` x `height` source inside a `max` x `max`
/// box. Never upscales; never returns a zero side.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w.min(max), h.min(max))
}

/// Decode source bytes (PNG, JPEG or WebP).
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("Failed to decode source image")
}

/// Resize a decoded image for one size class and encode it as WebP.
pub fn encode_variant(
    source: &DynamicImage,
    asset_type: AssetType,
    size: SizeClass,
    quality: u8,
) -> Result<Vec<u8>> {
    let max = asset_type.max_dimension(size);
    let (w, h) = fit_within(source.width(), source.height(), max);

    let resized = if (w, h) == (source.width(), source.height()) {
        source.to_rgba8()
    } else {
        source.resize(w, h, FilterType::Lanczos3).to_rgba8()
    };

    if resized.width() == 0 || resized.height() == 0 {
        anyhow::bail!("Cannot encode an empty image");
    }

    let encoded = webp::Encoder::from_rgba(resized.as_raw(), resized.width(), resized.height())
        .encode(f32::from(quality.min(100)));
    Ok(encoded.to_vec())
}

/// Decode `bytes` and encode one size class.
pub fn encode(bytes: &[u8], asset_type: AssetType, size: SizeClass, quality: u8) -> Result<Vec<u8>> {
    let source = decode(bytes)?;
    encode_variant(&source, asset_type, size, quality)
        .with_context(|| format!("Failed to encode {} {size} variant", asset_type.as_str()))
}

/// Decode `bytes` once and encode every size class, smallest first.
pub fn encode_all(
    bytes: &[u8],
    asset_type: AssetType,
    quality: u8,
) -> Result<Vec<(SizeClass, Vec<u8>)>> {
    let source = decode(bytes)?;
    SizeClass::ALL
        .iter()
        .map(|&size| {
            encode_variant(&source, asset_type, size, quality)
                .with_context(|| format!("Failed to encode {} {size} variant", asset_type.as_str()))
                .map(|bytes| (size, bytes))
        })
        .collect()
}
