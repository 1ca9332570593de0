use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde_json::json;
use tracing::{debug, info};

use super::AppState;
use crate::models::{IngestRequest, IngestResponse};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/ingest", post(handler))
}

/// Handle `POST /ingest`.
async fn handler(State(state): State<AppState>, Json(req): Json<IngestRequest>) -> impl IntoResponse {
    // ---
    debug!("POST /ingest - sensor {}", req.sensor_id);

    if req.sensor_id.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "sensor_id must not be empty" })),
        )
            .into_response();
    }

    let mut service = state.service.write().await;
    match service.ingest(&req.sensor_id, req.readings) {
        Ok(reading) => {
            info!("POST /ingest - accepted reading from {}", reading.sensor_id);
            (StatusCode::OK, Json(IngestResponse::from(&reading))).into_response()
        }
        Err(e) => e.into_response(),
    }
}
