// Web server: Axum-based job trigger and image resolver.
//
// Routes:
//   GET  /health                              always 200
//   GET  /api/images/{bucket}/{entity_id}     resolved image URL (public)
//   POST /api/jobs/hot-posts                  run the HOT-post job (bearer)
//   GET  /api/status                          job state and cache counts (bearer)
//
// Auth: the scheduler presents PITCHSIDE_JOB_SECRET as a bearer token.

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::pipeline::mirror::MediaContext;

pub mod auth;
pub mod handlers;

/// Live state of the HOT-post job, exposed via GET /api/status.
#[derive(Debug, Clone, Default)]
pub struct JobStatus {
    /// True while a run is in progress.
    pub running: bool,
    /// RFC 3339 time the current/last run started.
    pub started_at: Option<String>,
    /// RFC 3339 time the last run finished.
    pub finished_at: Option<String>,
    /// Error message from the last run, if it failed.
    pub last_error: Option<String>,
}

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub media: Arc<MediaContext>,
    pub config: Arc<Config>,
    pub hot_job: Arc<RwLock<JobStatus>>,
}

impl AppState {
    pub fn new(config: Config, media: Arc<MediaContext>) -> Self {
        Self {
            db: media.db.clone(),
            media,
            config: Arc::new(config),
            hot_job: Arc::new(RwLock::new(JobStatus::default())),
        }
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(
    config: Config,
    media: Arc<MediaContext>,
    port: u16,
    bind: &str,
) -> Result<()> {
    let app = build_router(AppState::new(config, media));

    let addr = format!("{bind}:{port}");
    info!("Pitchside listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Scheduler-only routes (require the job bearer token)
    let protected_api = Router::new()
        .route("/api/jobs/hot-posts", post(handlers::jobs::run_hot_posts))
        .route("/api/status", get(handlers::status::get_status))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_job_secret,
        ));

    // Public routes (no auth)
    let public_api = Router::new()
        .route("/health", get(health))
        .route(
            "/api/images/{bucket}/{entity_id}",
            get(handlers::images::get_image),
        );

    Router::new()
        .merge(protected_api)
        .merge(public_api)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Platform health check: always returns 200 OK.
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
