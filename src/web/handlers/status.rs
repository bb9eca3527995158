// GET /api/status: HOT job state plus notification and cache counts.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::pipeline::hot_posts::LAST_RUN_KEY;
use crate::web::AppState;

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let job = state.hot_job.read().await.clone();

    let last_run_at = state.db.get_job_state(LAST_RUN_KEY).await.unwrap_or_default();
    let notifications = state.db.notification_counts().await.unwrap_or_default();
    let cache = state.db.cache_status_counts().await.unwrap_or_default();

    let cache_counts: Vec<serde_json::Value> = cache
        .into_iter()
        .map(|(asset_type, status, count)| {
            serde_json::json!({ "asset_type": asset_type, "status": status, "count": count })
        })
        .collect();
    let notification_counts: serde_json::Map<String, serde_json::Value> = notifications
        .into_iter()
        .map(|(kind, count)| (kind, serde_json::Value::from(count)))
        .collect();

    Json(serde_json::json!({
        "hot_posts": {
            "running": job.running,
            "started_at": job.started_at,
            "finished_at": job.finished_at,
            "last_error": job.last_error,
            "last_run_at": last_run_at,
        },
        "notifications": notification_counts,
        "media_cache": cache_counts,
    }))
}
