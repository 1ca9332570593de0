//! Ingestion engine and service context.
//!
//! [`SensorService`] owns everything the request handlers need: the sensor
//! registry, the cleaned historical table, the realtime log and the process
//! counters. It is built once at startup and handed to the router; nothing
//! here lives in a global.
//!
//! Every mutation goes through [`SensorService::ingest`], which takes
//! `&mut self`. Callers serialize access (see `routes::AppState`).

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::aggregation::{self, DistributionRow, MapRow};
use crate::cleaning::HistoricalRecord;
use crate::config::{Config, MapConfig, Thresholds};
use crate::error::{ServiceError, ServiceResult};
use crate::historical::{self, HistoricalTable};
use crate::models::{HealthState, Readings, SensorReading, StatusResponse};
use crate::realtime_log::RealtimeLog;
use crate::registry::SensorRegistry;
use crate::validation::validate_readings;
use crate::whitelist;

// ---

#[derive(Debug)]
pub struct SensorService {
    // ---
    thresholds: Thresholds,
    map_config: MapConfig,
    registry: SensorRegistry,
    historical: HistoricalTable,
    log: RealtimeLog,
    started_at: Instant,
    total_readings: u64,
    last_update: Option<DateTime<Utc>>,
}

impl SensorService {
    /// Load the whitelist, historical dataset and realtime log named by
    /// `cfg`, then build the service.
    pub fn bootstrap(cfg: &Config) -> ServiceResult<Self> {
        // ---
        let sensors = whitelist::load_sensors(&cfg.sensors_path)?;
        let (historical, _stats) = historical::load_historical(&cfg.server.historical_data_file)?;
        let log = RealtimeLog::open(&cfg.server.storage_file)?;

        Ok(Self::new(
            cfg.server.thresholds,
            cfg.server.map_config.clone(),
            SensorRegistry::new(sensors),
            historical,
            log,
        ))
    }

    /// Build the service and hydrate live state from the restored log.
    pub fn new(
        thresholds: Thresholds,
        map_config: MapConfig,
        registry: SensorRegistry,
        historical: HistoricalTable,
        log: RealtimeLog,
    ) -> Self {
        // ---
        let mut service = SensorService {
            thresholds,
            map_config,
            registry,
            historical,
            log,
            started_at: Instant::now(),
            total_readings: 0,
            last_update: None,
        };
        service.hydrate();
        service
    }

    /// Replay the restored log into the registry and counters.
    fn hydrate(&mut self) {
        // ---
        self.total_readings = self.log.len() as u64;

        let mut restored = 0usize;
        let mut skipped = 0usize;
        for record in self.log.records() {
            let Some(reading) = SensorReading::from_record(record) else {
                skipped += 1;
                continue;
            };

            if self.last_update.map_or(true, |last| reading.timestamp > last) {
                self.last_update = Some(reading.timestamp);
            }
            if self.registry.restore_if_newer(reading) {
                restored += 1;
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} unreadable realtime records during hydration", skipped);
        }
        tracing::info!(
            total_readings = self.total_readings,
            active_sensors = self.registry.count_active(),
            updates_applied = restored,
            "Hydrated live state from realtime log"
        );
    }

    /// Authorize, validate, persist and record one reading.
    ///
    /// The log write happens before any in-memory state changes and undoes
    /// its own append on failure, so a failed call leaves the service
    /// untouched.
    pub fn ingest(&mut self, sensor_id: &str, readings: Readings) -> ServiceResult<SensorReading> {
        // ---
        if !self.registry.exists(sensor_id) {
            tracing::warn!("Rejected reading from unauthorized sensor {}", sensor_id);
            return Err(ServiceError::Unauthorized(sensor_id.to_string()));
        }

        let validation = validate_readings(&readings);
        if !validation.is_valid() {
            tracing::debug!("Invalid reading from {}: {:?}", sensor_id, validation.errors);
            return Err(ServiceError::InvalidReading(validation.errors));
        }

        let now = Utc::now();
        let reading = SensorReading::new(sensor_id, readings, now);

        self.log.append(reading.to_record())?;
        self.registry.update_latest(sensor_id, reading.clone(), now)?;
        self.total_readings += 1;
        self.last_update = Some(now);

        tracing::info!("Ingested reading from {} ({} total)", sensor_id, self.total_readings);
        Ok(reading)
    }

    /// Current health snapshot. No condition currently reports `Degraded`.
    pub fn status(&self) -> StatusResponse {
        // ---
        StatusResponse {
            status: HealthState::Healthy,
            uptime_seconds: self.started_at.elapsed().as_secs_f64(),
            active_sensors: self.registry.count_active(),
            total_readings: self.total_readings,
            last_update: self.last_update,
        }
    }

    pub fn map_snapshot(&self) -> Vec<MapRow> {
        aggregation::map_snapshot(&self.registry, &self.historical, &self.thresholds)
    }

    pub fn sensor_history(&self, sensor_id: &str) -> ServiceResult<Vec<HistoricalRecord>> {
        aggregation::sensor_history(&self.registry, &self.historical, sensor_id)
    }

    pub fn monthly_distribution(&self, year: i32, month: u32) -> ServiceResult<Vec<DistributionRow>> {
        aggregation::monthly_distribution(
            &self.registry,
            &self.historical,
            &self.thresholds,
            year,
            month,
        )
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn map_config(&self) -> &MapConfig {
        &self.map_config
    }

    pub fn total_readings(&self) -> u64 {
        self.total_readings
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }
}
