//! Sensor whitelist loading.
//!
//! The whitelist is a JSON array of `{id, location, metadata?}` entries where
//! `location` is a WKT `POINT(lon lat)`. Entries whose point cannot be parsed
//! or lies outside valid coordinates are skipped with a warning; a file that
//! cannot be read or is not a whitelist at all is fatal.

use std::{collections::BTreeMap, fs, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{ServiceError, ServiceResult};
use crate::models::SensorInfo;

static WKT_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^POINT\s*\(\s*(?P<lon>-?\d+\.?\d*)\s+(?P<lat>-?\d+\.?\d*)\s*\)")
        .expect("WKT point pattern compiles")
});

#[derive(Debug, Deserialize)]
struct WhitelistEntry {
    id: String,
    location: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Parse a WKT point into `(latitude, longitude)`.
///
/// Only the prefix has to match; anything after the closing parenthesis is
/// ignored.
pub fn parse_wkt_point(location: &str) -> Option<(f64, f64)> {
    // ---
    let caps = WKT_POINT.captures(location)?;
    let lon: f64 = caps.name("lon")?.as_str().parse().ok()?;
    let lat: f64 = caps.name("lat")?.as_str().parse().ok()?;

    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    Some((lat, lon))
}

/// Load the sensor whitelist from disk, in file order.
pub fn load_sensors(path: &Path) -> ServiceResult<Vec<SensorInfo>> {
    // ---
    tracing::info!("Loading sensors from {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| ServiceError::io_failure(path, e))?;
    let sensors = parse_sensors(&text).map_err(|e| ServiceError::io_failure(path, e))?;
    tracing::info!("Loaded {} valid sensors", sensors.len());
    Ok(sensors)
}

/// Parse whitelist JSON, dropping entries with an unusable location.
pub fn parse_sensors(text: &str) -> Result<Vec<SensorInfo>, serde_json::Error> {
    // ---
    let entries: Vec<WhitelistEntry> = serde_json::from_str(text)?;

    let sensors = entries
        .into_iter()
        .filter_map(|entry| {
            let Some((lat, lon)) = parse_wkt_point(&entry.location) else {
                tracing::warn!("Invalid WKT for sensor {}: {}", entry.id, entry.location);
                return None;
            };
            Some(SensorInfo::new(
                entry.id,
                entry.location,
                lat,
                lon,
                flatten_metadata(entry.metadata),
            ))
        })
        .collect();

    Ok(sensors)
}

/// Metadata values are kept as text; non-string JSON values are rendered.
fn flatten_metadata(raw: serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, String> {
    raw.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_wkt_point_basic() {
        // ---
        assert_eq!(parse_wkt_point("POINT(5.29 52.13)"), Some((52.13, 5.29)));
    }

    #[test]
    fn test_parse_wkt_point_whitespace_and_case() {
        // ---
        assert_eq!(parse_wkt_point("point ( -3.7 40.4 )"), Some((40.4, -3.7)));
        assert_eq!(parse_wkt_point("POINT(4 52)"), Some((52.0, 4.0)));
        assert_eq!(parse_wkt_point("POINT(4. 52.)"), Some((52.0, 4.0)));
    }

    #[test]
    fn test_parse_wkt_point_out_of_range() {
        // ---
        assert_eq!(parse_wkt_point("POINT(200 52.13)"), None);
        assert_eq!(parse_wkt_point("POINT(5.29 -91)"), None);
        assert_eq!(parse_wkt_point("POINT(180 90)"), Some((90.0, 180.0)));
    }

    #[test]
    fn test_parse_wkt_point_must_match_from_start() {
        // ---
        assert_eq!(parse_wkt_point(" POINT(5 52)"), None);
        assert_eq!(parse_wkt_point("SRID=4326;POINT(5 52)"), None);
        assert_eq!(parse_wkt_point("POINT(5,52)"), None);
        assert_eq!(parse_wkt_point("LINESTRING(0 0, 1 1)"), None);
        assert_eq!(parse_wkt_point("POINT(5 52) trailing"), Some((52.0, 5.0)));
    }

    #[test]
    fn test_parse_sensors_skips_invalid_locations() {
        // ---
        let text = r#"[
            {"id": "sensor_amsterdam_001", "location": "POINT(4.90 52.37)",
             "metadata": {"province": "Noord-Holland", "region": "Randstad", "height": 3}},
            {"id": "sensor_bad", "location": "POINT(200 52.13)"},
            {"id": "sensor_utrecht_001", "location": "POINT(5.12 52.09)"}
        ]"#;
        let sensors = parse_sensors(text).unwrap();
        assert_eq!(sensors.len(), 2);

        let ams = &sensors[0];
        assert_eq!(ams.id, "sensor_amsterdam_001");
        assert_eq!(ams.location, "POINT(4.90 52.37)");
        assert_eq!(ams.latitude, 52.37);
        assert_eq!(ams.longitude, 4.90);
        assert_eq!(ams.province(), Some("Noord-Holland"));
        assert_eq!(ams.region(), Some("Randstad"));
        assert_eq!(ams.metadata.get("height").map(String::as_str), Some("3"));
        assert!(ams.last_reading.is_none());

        assert_eq!(sensors[1].id, "sensor_utrecht_001");
        assert!(sensors[1].metadata.is_empty());
    }

    #[test]
    fn test_parse_sensors_rejects_non_array() {
        // ---
        assert!(parse_sensors(r#"{"id": "x"}"#).is_err());
        assert!(parse_sensors(r#"[{"location": "POINT(1 1)"}]"#).is_err());
    }
}
