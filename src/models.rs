//! Data models for the air quality pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Pollutant name to measured value, as sent by a sensor.
pub type Readings = BTreeMap<String, f64>;

/// One ingested observation. Values are stored as received.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    // ---
    pub sensor_id: String,
    pub readings: Readings,
    pub timestamp: DateTime<Utc>,
}

/// Static whitelist attributes plus the latest live observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorInfo {
    // ---
    pub id: String,
    /// WKT point exactly as written in the whitelist.
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub metadata: BTreeMap<String, String>,
    pub last_reading: Option<SensorReading>,
    pub last_update: Option<DateTime<Utc>>,
}

/// The four tracked pollutants; any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    // ---
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
}

/// Air quality severity bucket derived from PM2.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    // ---
    Safe,
    Moderate,
    Unhealthy,
    Dangerous,
    #[serde(rename = "No data")]
    NoData,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Safe => "Safe",
            Category::Moderate => "Moderate",
            Category::Unhealthy => "Unhealthy",
            Category::Dangerous => "Dangerous",
            Category::NoData => "No data",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Pollutants {
    /// Pick the tracked pollutants out of a free-form readings map.
    pub fn from_readings(readings: &Readings) -> Self {
        // ---
        let pick = |key: &str| readings.get(key).copied().filter(|v| !v.is_nan());
        Pollutants {
            pm25: pick("pm25"),
            pm10: pick("pm10"),
            no2: pick("no2"),
            o3: pick("o3"),
        }
    }
}

impl SensorReading {
    // ---
    pub fn new(sensor_id: impl Into<String>, readings: Readings, timestamp: DateTime<Utc>) -> Self {
        SensorReading {
            sensor_id: sensor_id.into(),
            readings,
            timestamp,
        }
    }

    /// Realtime log representation of this reading.
    pub fn to_record(&self) -> serde_json::Value {
        // ---
        serde_json::json!({
            "sensor_id": self.sensor_id,
            "readings": self.readings,
            "timestamp": format_instant(&self.timestamp),
        })
    }

    /// Rebuild a reading from a realtime log record.
    ///
    /// Requires a string `sensor_id` and a parseable `timestamp`. Reading
    /// entries that are not numbers are left out rather than rejecting the
    /// whole record.
    pub fn from_record(record: &serde_json::Value) -> Option<Self> {
        // ---
        let sensor_id = record.get("sensor_id")?.as_str()?;
        let timestamp = parse_instant(record.get("timestamp")?.as_str()?)?;
        let readings = record
            .get("readings")
            .and_then(|r| r.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                    .collect()
            })
            .unwrap_or_default();

        Some(SensorReading::new(sensor_id, readings, timestamp))
    }
}

impl SensorInfo {
    // ---
    pub fn new(
        id: impl Into<String>,
        location: impl Into<String>,
        latitude: f64,
        longitude: f64,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        SensorInfo {
            id: id.into(),
            location: location.into(),
            latitude,
            longitude,
            metadata,
            last_reading: None,
            last_update: None,
        }
    }

    pub fn province(&self) -> Option<&str> {
        self.metadata.get("province").map(String::as_str)
    }

    pub fn region(&self) -> Option<&str> {
        self.metadata.get("region").map(String::as_str)
    }
}

/// ISO-8601 with microseconds and an explicit `+00:00` offset.
pub fn format_instant(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse a timestamp into a UTC instant.
///
/// Accepts RFC 3339 with any offset, naive `YYYY-MM-DD[ T]HH:MM[:SS[.f]]`
/// (taken as UTC) and bare dates (midnight UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---

/// Body of `POST /ingest`.
#[derive(Debug, Deserialize, Serialize)]
pub struct IngestRequest {
    // ---
    pub sensor_id: String,
    pub readings: Readings,
}

/// Successful `POST /ingest` response.
#[derive(Debug, Deserialize, Serialize)]
pub struct IngestResponse {
    // ---
    pub status: String,
    pub message: String,
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&SensorReading> for IngestResponse {
    fn from(reading: &SensorReading) -> Self {
        IngestResponse {
            status: "ok".to_string(),
            message: "Reading ingested".to_string(),
            sensor_id: reading.sensor_id.clone(),
            timestamp: reading.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

/// Response of the status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    // ---
    pub status: HealthState,
    pub uptime_seconds: f64,
    pub active_sensors: usize,
    pub total_readings: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn sample_reading() -> SensorReading {
        // ---
        let mut readings = Readings::new();
        readings.insert("pm25".to_string(), 20.0);
        readings.insert("no2".to_string(), 15.5);
        SensorReading::new(
            "sensor_amsterdam_001",
            readings,
            Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap(),
        )
    }

    #[test]
    fn test_record_shape() {
        // ---
        let record = sample_reading().to_record();
        assert_eq!(record["sensor_id"], "sensor_amsterdam_001");
        assert_eq!(record["readings"]["pm25"], 20.0);
        assert_eq!(record["timestamp"], "2025-03-26T18:45:00.000000+00:00");
    }

    #[test]
    fn test_from_record_recovers_reading() {
        // ---
        let written = sample_reading();
        let restored = SensorReading::from_record(&written.to_record()).unwrap();
        assert_eq!(restored, written);
    }

    #[test]
    fn test_from_record_skips_non_numeric_values() {
        // ---
        let record = serde_json::json!({
            "sensor_id": "s1",
            "readings": {"pm25": 3.5, "note": "calibrating"},
            "timestamp": "2024-01-01T00:00:00"
        });
        let reading = SensorReading::from_record(&record).unwrap();
        assert_eq!(reading.readings.len(), 1);
        assert_eq!(reading.readings["pm25"], 3.5);
    }

    #[test]
    fn test_from_record_rejects_bad_timestamp() {
        // ---
        let record = serde_json::json!({"sensor_id": "s1", "readings": {}, "timestamp": "yesterday"});
        assert!(SensorReading::from_record(&record).is_none());
    }

    #[test]
    fn test_parse_instant_formats() {
        // ---
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T11:30:00+01:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-15 10:30:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T10:30"), Some(expected));
        assert_eq!(parse_instant(" 2024-01-15 10:30:00 "), Some(expected));

        let midnight = parse_instant("2024-01-15").unwrap();
        assert_eq!(midnight.hour(), 0);

        let fractional = parse_instant("2024-01-15 10:30:00.250").unwrap();
        assert_eq!(fractional.nanosecond(), 250_000_000);

        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("not a date"), None);
        assert_eq!(parse_instant("2024-13-01"), None);
    }

    #[test]
    fn test_pollutants_from_readings_ignores_unknown_keys() {
        // ---
        let mut readings = Readings::new();
        readings.insert("pm25".to_string(), 8.0);
        readings.insert("co".to_string(), 0.4);
        let p = Pollutants::from_readings(&readings);
        assert_eq!(p.pm25, Some(8.0));
        assert_eq!(p.pm10, None);
        assert_eq!(p.no2, None);
        assert_eq!(p.o3, None);
    }

    #[test]
    fn test_category_serializes_with_labels() {
        // ---
        assert_eq!(serde_json::to_value(Category::NoData).unwrap(), "No data");
        assert_eq!(serde_json::to_value(Category::Unhealthy).unwrap(), "Unhealthy");
        assert_eq!(Category::NoData.to_string(), "No data");
    }

    #[test]
    fn test_ingest_response_from_reading() {
        // ---
        let reading = sample_reading();
        let resp = IngestResponse::from(&reading);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.sensor_id, "sensor_amsterdam_001");
        assert_eq!(resp.timestamp, reading.timestamp);
    }
}
