use axum::{routing::get, Router, extract::State, http::StatusCode};
use std::sync::atomic::Ordering;
use crate::server::AppState;
use serde_json::json;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_health", get(health_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/_build", get(build_handler))
        .route("/_state", get(state_handler))
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn ready_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.readiness.load(Ordering::SeqCst) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY")
    }
}

async fn build_handler(State(state): State<AppState>) -> String {
    state.version.clone()
}

async fn metrics_handler(State(state): State<AppState>) -> (StatusCode, String) {
    let data = state.metrics.encode();
    (StatusCode::OK, String::from_utf8_lossy(&data).to_string())
}

async fn state_handler(State(state): State<AppState>) -> (StatusCode, String) {
    let ready = state.readiness.load(Ordering::SeqCst);
    let body = json!({
        "ready": ready,
        "issuer": state.service.registry().issuer().to_string(),
        "uploads_in_progress": state.metrics.uploads_in_progress.get(),
    }).to_string();
    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, body)
}
