// GET /api/images/{bucket}/{entity_id}: resolve the URL a client should load.
//
// Ready index rows answer immediately; misses mirror synchronously and fall
// back to the origin URL on timeout or failure.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tracing::error;

use crate::media::asset::AssetType;
use crate::pipeline::mirror::resolve_image_url;
use crate::web::{api_error, AppState};

pub async fn get_image(
    State(state): State<AppState>,
    Path((bucket, entity_id)): Path<(String, i64)>,
) -> Response {
    let Some(asset_type) = AssetType::from_bucket(&bucket) else {
        return api_error(StatusCode::NOT_FOUND, "Unknown bucket");
    };

    match resolve_image_url(&state.media, asset_type, entity_id, Utc::now()).await {
        Ok(resolved) => Json(resolved).into_response(),
        Err(e) => {
            error!(bucket, entity_id, error = %e, "Image resolution failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Image resolution failed")
        }
    }
}
