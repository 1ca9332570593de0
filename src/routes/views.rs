//! Read-only views: live map, per-sensor history and monthly distribution.
//!
//! These return JSON; turning them into maps or charts is left to the
//! presentation layer.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::AppState;
use crate::aggregation::{DistributionRow, MapRow};
use crate::cleaning::HistoricalRecord;
use crate::config::MapConfig;
use crate::error::ServiceError;

// ---

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

#[derive(Serialize)]
struct MapResponse {
    map_config: MapConfig,
    sensors: Vec<MapRow>,
}

#[derive(Serialize)]
struct HistoryResponse {
    sensor_id: String,
    readings: Vec<HistoricalRecord>,
}

#[derive(Serialize)]
struct DistributionResponse {
    year: i32,
    month: u32,
    rows: Vec<DistributionRow>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/map", get(map))
        .route("/history/{sensor_id}", get(history))
        .route("/distribution/{year}/{month}", get(distribution))
}

async fn map(State(state): State<AppState>) -> Json<MapResponse> {
    // ---
    let service = state.service.read().await;
    Json(MapResponse {
        map_config: service.map_config().clone(),
        sensors: service.map_snapshot(),
    })
}

async fn history(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    // ---
    let service = state.service.read().await;
    let readings = service.sensor_history(&sensor_id)?;
    Ok(Json(HistoryResponse {
        sensor_id,
        readings,
    }))
}

async fn distribution(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    // ---
    let year: i32 = parse_path_part("year", &year)?;
    let month: u32 = parse_path_part("month", &month)?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ServiceError::InvalidArgument(format!(
            "Year must be between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }

    let service = state.service.read().await;
    let rows = service.monthly_distribution(year, month)?;
    Ok(Json(DistributionResponse { year, month, rows }))
}

fn parse_path_part<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::InvalidArgument(format!("{name} must be an integer, got '{raw}'")))
}
