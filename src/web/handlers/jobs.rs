// POST /api/jobs/hot-posts: run the HOT-post job and return its summary.
//
// Returns 200 with the summary on success.
// Returns 409 Conflict if a run is already in progress.
// Returns 500 with { success: false, error } if the run fails.
//
// The scheduler waits for the summary, but the run itself is a spawned task
// that finishes and resets the job status even if the request goes away.

use std::panic::AssertUnwindSafe;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::FutureExt;
use tracing::error;

use crate::pipeline::hot_posts;
use crate::web::AppState;

/// POST /api/jobs/hot-posts: rank, dedup and notify.
pub async fn run_hot_posts(State(state): State<AppState>) -> Response {
    {
        let mut status = state.hot_job.write().await;
        if status.running {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "success": false,
                    "error": "A HOT-post run is already in progress",
                })),
            )
                .into_response();
        }
        status.running = true;
        status.started_at = Some(Utc::now().to_rfc3339());
        status.last_error = None;
    }

    // `running` is cleared by the task, even if this request is dropped
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let result = AssertUnwindSafe(hot_posts::run(
            task_state.db.as_ref(),
            &task_state.config.hot,
            Utc::now(),
            false,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(anyhow::anyhow!("HOT-post run panicked")));

        let mut status = task_state.hot_job.write().await;
        status.running = false;
        status.finished_at = Some(Utc::now().to_rfc3339());
        if let Err(e) = &result {
            status.last_error = Some(format!("{e:#}"));
        }
        result
    });

    let result = match handle.await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("HOT-post task failed: {e}")),
    };

    match result {
        Ok(run) => (StatusCode::OK, Json(run.summary)).into_response(),
        Err(e) => {
            error!(error = %e, "HOT-post run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": format!("{e:#}"),
                })),
            )
                .into_response()
        }
    }
}
