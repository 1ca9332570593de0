//! Validation rules for incoming reading payloads.
//!
//! Rules are all evaluated and their messages collected in a fixed order,
//! except for an empty payload which fails on its own.

use crate::models::Readings;

pub const EMPTY_READINGS: &str = "Readings dictionary is empty";
pub const NEGATIVE_VALUE: &str = "Negative pollutant values are not allowed.";
pub const PM25_TOO_LARGE: &str = "PM2.5 value too large (>500).";
pub const NO2_TOO_LARGE: &str = "NO2 value too large (>400).";

/// Upper sanity bound for PM2.5, shared with historical cleaning.
pub const PM25_MAX: f64 = 500.0;
/// Upper sanity bound for NO2, shared with historical cleaning.
pub const NO2_MAX: f64 = 400.0;

/// Outcome of validating one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub errors: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_readings(readings: &Readings) -> Validation {
    // ---
    if readings.is_empty() {
        return Validation {
            errors: vec![EMPTY_READINGS.to_string()],
        };
    }

    let mut errors = Vec::new();

    if readings.values().any(|v| *v < 0.0) {
        errors.push(NEGATIVE_VALUE.to_string());
    }
    if readings.get("pm25").is_some_and(|v| *v > PM25_MAX) {
        errors.push(PM25_TOO_LARGE.to_string());
    }
    if readings.get("no2").is_some_and(|v| *v > NO2_MAX) {
        errors.push(NO2_TOO_LARGE.to_string());
    }

    Validation { errors }
}
