//! Derived read-only views over live state and the historical table.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cleaning::HistoricalRecord;
use crate::config::Thresholds;
use crate::error::{ServiceError, ServiceResult};
use crate::historical::HistoricalTable;
use crate::models::{Category, Pollutants};
use crate::registry::SensorRegistry;

pub const UNKNOWN_PROVINCE: &str = "Unknown";

/// One sensor on the live map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRow {
    // ---
    pub sensor_id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub pollutants: Pollutants,
    pub last_update: Option<DateTime<Utc>>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub category: Category,
}

/// Share of one category among a province's readings for a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRow {
    // ---
    pub province: String,
    pub category: Category,
    pub count: usize,
    pub percentage: f64,
}

/// Latest known values for every registered sensor, in registry order.
///
/// Live readings win; otherwise the newest historical row is used, and a
/// sensor with neither gets an all-empty row.
pub fn map_snapshot(
    registry: &SensorRegistry,
    historical: &HistoricalTable,
    thresholds: &Thresholds,
) -> Vec<MapRow> {
    // ---
    registry
        .iter()
        .map(|sensor| {
            let (pollutants, last_update) = match &sensor.last_reading {
                Some(live) => (Pollutants::from_readings(&live.readings), Some(live.timestamp)),
                None => historical
                    .latest_for(&sensor.id)
                    .map(|row| (row.pollutants, Some(row.timestamp)))
                    .unwrap_or_default(),
            };

            MapRow {
                sensor_id: sensor.id.clone(),
                lat: sensor.latitude,
                lon: sensor.longitude,
                pollutants,
                last_update,
                province: sensor.province().map(String::from),
                region: sensor.region().map(String::from),
                category: thresholds.categorize(pollutants.pm25),
            }
        })
        .collect()
}

/// All historical rows for a sensor, oldest first.
pub fn sensor_history(
    registry: &SensorRegistry,
    historical: &HistoricalTable,
    sensor_id: &str,
) -> ServiceResult<Vec<HistoricalRecord>> {
    // ---
    if !registry.exists(sensor_id) {
        return Err(ServiceError::NotFound(format!("sensor {sensor_id}")));
    }

    let mut rows: Vec<HistoricalRecord> = historical.for_sensor(sensor_id).cloned().collect();
    if rows.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "no historical data for sensor {sensor_id}"
        )));
    }
    rows.sort_by_key(|r| r.timestamp);
    Ok(rows)
}

/// Per-province category shares of PM2.5 readings for one month.
///
/// Rows come out ordered by province, then category.
pub fn monthly_distribution(
    registry: &SensorRegistry,
    historical: &HistoricalTable,
    thresholds: &Thresholds,
    year: i32,
    month: u32,
) -> ServiceResult<Vec<DistributionRow>> {
    // ---
    if !(1..=12).contains(&month) {
        return Err(ServiceError::InvalidArgument(format!(
            "Month must be between 1 and 12, got {month}"
        )));
    }

    let province_of: HashMap<&str, &str> = registry
        .iter()
        .map(|s| (s.id.as_str(), s.province().unwrap_or(UNKNOWN_PROVINCE)))
        .collect();

    let mut counts: BTreeMap<(&str, Category), usize> = BTreeMap::new();
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for row in historical.in_month(year, month) {
        let province = province_of
            .get(row.sensor_id.as_str())
            .copied()
            .unwrap_or(UNKNOWN_PROVINCE);
        let category = thresholds.categorize(row.pollutants.pm25);
        *counts.entry((province, category)).or_default() += 1;
        *totals.entry(province).or_default() += 1;
    }

    if counts.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "no data for {year}-{month:02}"
        )));
    }

    let rows = counts
        .into_iter()
        .map(|((province, category), count)| DistributionRow {
            province: province.to_string(),
            category,
            count,
            percentage: count as f64 / totals[province] as f64 * 100.0,
        })
        .collect();
    Ok(rows)
}
