//! Ingestion and aggregation engine for the air quality monitoring service.
//!
//! Sensors on a static whitelist post pollutant readings; readings are
//! validated, appended to a realtime log on disk and kept as each sensor's
//! latest state. Alongside a cleaned historical dataset this feeds three
//! views: a live map snapshot, per-sensor history, and a monthly PM2.5
//! category distribution per province.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): the
//! binary only talks to `config`, `engine` and the `routes` gateway.

pub mod aggregation;
pub mod cleaning;
pub mod config;
pub mod engine;
pub mod error;
pub mod historical;
pub mod models;
pub mod realtime_log;
pub mod registry;
pub mod routes;
pub mod validation;
pub mod whitelist;

pub use config::Config;
pub use engine::SensorService;
pub use error::{ServiceError, ServiceResult};
pub use models::{SensorInfo, SensorReading};
