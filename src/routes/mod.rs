//! HTTP gateway for the service.
//!
//! Each sibling module owns one group of endpoints and exports a subrouter;
//! this module merges them, attaches the shared [`AppState`] and translates
//! [`ServiceError`] into HTTP responses.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tokio::sync::RwLock;

use crate::engine::SensorService;
use crate::error::ServiceError;

mod ingest;
mod status;
mod views;

// ---

/// Shared handle to the service context.
///
/// `ingest` holds the write lock for the whole operation; queries share the
/// read lock and therefore always see a fully applied ingest.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RwLock<SensorService>>,
}

impl AppState {
    pub fn new(service: SensorService) -> Self {
        AppState {
            service: Arc::new(RwLock::new(service)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(views::router())
        .merge(status::router())
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // ---
        let (code, detail) = match self {
            ServiceError::Unauthorized(_) => (StatusCode::FORBIDDEN, json!("Unauthorized sensor")),
            ServiceError::InvalidReading(errors) => {
                (StatusCode::BAD_REQUEST, json!({ "errors": errors }))
            }
            ServiceError::NotFound(what) => (StatusCode::NOT_FOUND, json!(what)),
            ServiceError::InvalidArgument(what) => (StatusCode::BAD_REQUEST, json!(what)),
            err @ (ServiceError::IoFailure { .. } | ServiceError::StorageWriteFailure { .. }) => {
                tracing::error!("Request failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!(err.to_string()))
            }
        };
        (code, Json(json!({ "detail": detail }))).into_response()
    }
}
