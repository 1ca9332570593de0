//! Registry of whitelisted sensors and their latest live state.
//!
//! Built once at startup from the whitelist. Sensors are never added or
//! removed afterwards; only `last_reading`/`last_update` change, through
//! ingestion or startup hydration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{SensorInfo, SensorReading};

#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    // ---
    sensors: Vec<SensorInfo>,
    index: HashMap<String, usize>,
}

impl SensorRegistry {
    /// Build a registry in whitelist order.
    ///
    /// A repeated id replaces the earlier entry's attributes but keeps its
    /// position.
    pub fn new(sensors: Vec<SensorInfo>) -> Self {
        // ---
        let mut registry = SensorRegistry::default();
        for sensor in sensors {
            match registry.index.get(&sensor.id).copied() {
                Some(pos) => {
                    tracing::warn!("Duplicate whitelist entry for sensor {}, keeping the last", sensor.id);
                    registry.sensors[pos] = sensor;
                }
                None => {
                    registry.index.insert(sensor.id.clone(), registry.sensors.len());
                    registry.sensors.push(sensor);
                }
            }
        }
        registry
    }

    pub fn exists(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> ServiceResult<&SensorInfo> {
        self.index
            .get(id)
            .map(|&pos| &self.sensors[pos])
            .ok_or_else(|| ServiceError::NotFound(format!("sensor {id}")))
    }

    fn get_mut(&mut self, id: &str) -> ServiceResult<&mut SensorInfo> {
        match self.index.get(id) {
            Some(&pos) => Ok(&mut self.sensors[pos]),
            None => Err(ServiceError::NotFound(format!("sensor {id}"))),
        }
    }

    /// Record `reading` as the latest observation of sensor `id`.
    pub fn update_latest(
        &mut self,
        id: &str,
        reading: SensorReading,
        timestamp: DateTime<Utc>,
    ) -> ServiceResult<()> {
        // ---
        let info = self.get_mut(id)?;
        info.last_reading = Some(reading);
        info.last_update = Some(timestamp);
        Ok(())
    }

    /// Offer a restored log entry; it is kept only if strictly newer than
    /// what the sensor already holds. Returns whether it was kept.
    pub fn restore_if_newer(&mut self, reading: SensorReading) -> bool {
        // ---
        let Ok(info) = self.get_mut(&reading.sensor_id) else {
            return false;
        };
        if info.last_update.is_some_and(|current| reading.timestamp <= current) {
            return false;
        }
        info.last_update = Some(reading.timestamp);
        info.last_reading = Some(reading);
        true
    }

    /// Number of sensors that have a live reading.
    pub fn count_active(&self) -> usize {
        self.sensors.iter().filter(|s| s.last_reading.is_some()).count()
    }

    /// All sensors in whitelist order.
    pub fn iter(&self) -> impl Iterator<Item = &SensorInfo> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
