//! The health/status/metrics HTTP surface (SPEC_FULL §0: "a tiny `axum`
//! health/status surface"), grounded on `quantum-telemetry::http`'s
//! minimal-router shape.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Serialize)]
pub struct Status {
    pub live_epoch: u64,
    pub state_epoch: u64,
    pub last_commit_epoch: u64,
}

pub type StatusFn = dyn Fn() -> Status + Send + Sync;

#[derive(Clone)]
struct AppState {
    status: Arc<StatusFn>,
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json((state.status)())
}

async fn metrics() -> impl IntoResponse {
    match axe_telemetry::gather_text() {
        Ok(text) => (StatusCode::OK, text),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// Serves `/healthz`, `/status` and `/metrics` on `addr` until the process
/// exits. Runs forever; spawn it and let it ride alongside the rest of the
/// node's tasks.
pub async fn serve(addr: &str, status_fn: Arc<StatusFn>) -> std::io::Result<()> {
    let state = AppState { status: status_fn };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "health/status surface listening");
    axum::serve(listener, router).await
}
