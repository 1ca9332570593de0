//! Cleaning pipeline for the historical dataset.
//!
//! Each step is a filter over the raw rows; surviving rows keep their order
//! and values, the only change being the timestamp going from text to a UTC
//! instant. A pollutant column that exists in the source must hold a
//! non-negative number in every surviving row; a column the source does not
//! have is not checked at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{format_instant, parse_instant, Pollutants};
use crate::validation::{NO2_MAX, PM25_MAX};

// ---

/// A historical row as read from disk, before cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    // ---
    pub sensor_id: Option<String>,
    pub timestamp: Option<String>,
    pub pollutants: Pollutants,
}

/// Which pollutant columns the source table has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollutantColumns {
    // ---
    pub pm25: bool,
    pub pm10: bool,
    pub no2: bool,
    pub o3: bool,
}

impl PollutantColumns {
    pub const ALL: PollutantColumns = PollutantColumns {
        pm25: true,
        pm10: true,
        no2: true,
        o3: true,
    };
}

/// Raw historical rows plus the pollutant columns their source declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    // ---
    pub columns: PollutantColumns,
    pub rows: Vec<RawRecord>,
}

/// A cleaned historical row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub pollutants: Pollutants,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CleaningStats {
    // ---
    pub initial_rows: usize,
    pub final_rows: usize,
    pub dropped_rows: usize,
    pub percent_cleaned: f64,
}

impl From<&HistoricalRecord> for RawRecord {
    fn from(rec: &HistoricalRecord) -> Self {
        RawRecord {
            sensor_id: Some(rec.sensor_id.clone()),
            timestamp: Some(format_instant(&rec.timestamp)),
            pollutants: rec.pollutants,
        }
    }
}

/// Run the cleaning pipeline over `table`.
pub fn clean_historical(table: RawTable) -> (Vec<HistoricalRecord>, CleaningStats) {
    // ---
    let RawTable { columns, rows } = table;
    let initial_rows = rows.len();

    let cleaned: Vec<HistoricalRecord> = rows
        .into_iter()
        .filter(|r| r.sensor_id.is_some() && r.timestamp.is_some())
        .filter(|r| non_negative(&columns, &r.pollutants))
        .filter(|r| !columns.pm25 || r.pollutants.pm25.is_some_and(|v| v <= PM25_MAX))
        .filter(|r| !columns.no2 || r.pollutants.no2.is_some_and(|v| v <= NO2_MAX))
        .filter_map(|r| {
            let timestamp = parse_instant(r.timestamp.as_deref()?)?;
            Some(HistoricalRecord {
                sensor_id: r.sensor_id?,
                timestamp,
                pollutants: r.pollutants,
            })
        })
        .collect();

    let final_rows = cleaned.len();
    let dropped_rows = initial_rows - final_rows;
    let percent_cleaned = if initial_rows == 0 {
        0.0
    } else {
        dropped_rows as f64 / initial_rows as f64 * 100.0
    };

    let stats = CleaningStats {
        initial_rows,
        final_rows,
        dropped_rows,
        percent_cleaned,
    };
    (cleaned, stats)
}

/// Every declared column holds a value `>= 0`; a missing value fails.
fn non_negative(columns: &PollutantColumns, p: &Pollutants) -> bool {
    [
        (columns.pm25, p.pm25),
        (columns.pm10, p.pm10),
        (columns.no2, p.no2),
        (columns.o3, p.o3),
    ]
    .into_iter()
    .filter(|(declared, _)| *declared)
    .all(|(_, value)| value.is_some_and(|v| v >= 0.0))
}
