use crate::handlers::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Health endpoints, kept outside the session guard
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

/// Liveness probe. Succeeds whenever the process is up.
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Readiness probe. Ready means the database answers a ping.
async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = Instant::now();

    match crate::db::check_connection(&state.db).await {
        Ok(()) => {
            let database = json!({
                "status": "up",
                "latency_ms": started.elapsed().as_millis() as u64,
            });
            (
                StatusCode::OK,
                Json(json!({ "status": "ready", "checks": { "database": database } })),
            )
        }
        Err(e) => {
            let database = json!({ "status": "down", "error": e.to_string() });
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready", "checks": { "database": database } })),
            )
        }
    }
}
