// Auth middleware: bearer-token check for scheduler-triggered routes.
//
// The external scheduler sends `Authorization: Bearer <PITCHSIDE_JOB_SECRET>`.
// An unset secret rejects every request rather than allowing all.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;

/// Axum middleware: reject requests without the job bearer token with 401.
pub async fn require_job_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let secret = &state.config.job_secret;
    let authorized = !secret.is_empty()
        && bearer_token(request.headers()).is_some_and(|token| constant_time_eq(token, secret));

    if !authorized {
        return super::api_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    next.run(request).await
}

/// Extract the token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
