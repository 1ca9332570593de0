// src/routes/status.rs
//! Liveness and status endpoints.
//!
//! - `GET /health` is a static probe for orchestrators and CI. It does not
//!   touch the service state.
//! - `GET /status` reports uptime, active sensors, total readings and the
//!   time of the last accepted reading.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::models::StatusResponse;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Handle `GET /status`.
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    // ---
    let service = state.service.read().await;
    Json(service.status())
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
}
