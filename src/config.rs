//! Configuration loader for the `aether-aqms` service.
//!
//! Configuration comes in two layers. The process environment (with optional
//! `.env` support provided by the caller) decides *where* things live and
//! which address to bind. The JSON server configuration file it points at
//! carries the data paths, the PM2.5 category thresholds and the map
//! presentation settings. Both are consolidated here so that no other module
//! touches `env::var` or parses config files.
use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::models::Category;

/// Parse an optional environment variable into `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional path-valued environment variable.
macro_rules! env_path_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from($default))
    };
}

pub const DEFAULT_CONFIG_PATH: &str = "config/server_config.json";
pub const DEFAULT_SENSORS_PATH: &str = "config/sensors.json";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Location of the JSON server configuration file.
    pub config_path: PathBuf,

    /// Location of the JSON sensor whitelist.
    pub sensors_path: PathBuf,

    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// Parsed contents of `config_path`.
    pub server: ServerConfig,
}

/// Contents of the server configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    // ---
    pub historical_data_file: PathBuf,
    pub storage_file: PathBuf,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub map_config: MapConfig,
}

/// Ascending PM2.5 limits used to bucket readings into a [`Category`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    // ---
    pub pm25_safe: f64,
    pub pm25_moderate: f64,
    pub pm25_danger: f64,
}

/// Presentation hints handed through to map consumers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MapConfig {
    // ---
    #[serde(default = "default_zoom")]
    pub default_zoom: f64,
    #[serde(default = "default_map_style")]
    pub map_style: String,
}

fn default_zoom() -> f64 {
    7.0
}

fn default_map_style() -> String {
    "open-street-map".to_string()
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            default_zoom: default_zoom(),
            map_style: default_map_style(),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `AETHER_CONFIG_PATH` – server config JSON (default: `config/server_config.json`)
/// - `AETHER_SENSORS_PATH` – sensor whitelist JSON (default: `config/sensors.json`)
/// - `AETHER_BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
///
/// Returns an error if a variable is invalid or the server config file
/// cannot be read or parsed.
pub fn load_from_env() -> Result<Config> {
    // ---
    let config_path = env_path_or!("AETHER_CONFIG_PATH", DEFAULT_CONFIG_PATH);
    let sensors_path = env_path_or!("AETHER_SENSORS_PATH", DEFAULT_SENSORS_PATH);
    let bind_addr = parse_env!(
        "AETHER_BIND_ADDR",
        SocketAddr,
        SocketAddr::from(([0, 0, 0, 0], 8080))
    );

    let server = ServerConfig::from_file(&config_path)?;

    Ok(Config {
        config_path,
        sensors_path,
        bind_addr,
        server,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        let t = &self.server.thresholds;
        tracing::info!("Configuration loaded:");
        tracing::info!("  CONFIG_PATH     : {}", self.config_path.display());
        tracing::info!("  SENSORS_PATH    : {}", self.sensors_path.display());
        tracing::info!("  BIND_ADDR       : {}", self.bind_addr);
        tracing::info!("  HISTORICAL_FILE : {}", self.server.historical_data_file.display());
        tracing::info!("  STORAGE_FILE    : {}", self.server.storage_file.display());
        tracing::info!(
            "  PM25 THRESHOLDS : safe={} moderate={} danger={}",
            t.pm25_safe,
            t.pm25_moderate,
            t.pm25_danger
        );
    }
}

impl ServerConfig {
    /// Read and validate a server configuration file.
    pub fn from_file(path: impl Into<PathBuf>) -> ServiceResult<Self> {
        // ---
        let path = path.into();
        tracing::info!("Loading server config from {}", path.display());

        let text = fs::read_to_string(&path).map_err(|e| ServiceError::io_failure(&path, e))?;
        Self::from_json(&text).map_err(|reason| ServiceError::io_failure(&path, reason))
    }

    /// Parse a server configuration document; errors are human readable.
    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        // ---
        let cfg: ServerConfig = serde_json::from_str(text).map_err(|e| e.to_string())?;
        cfg.thresholds.check()?;
        Ok(cfg)
    }
}

impl Thresholds {
    // ---
    fn check(&self) -> std::result::Result<(), String> {
        // ---
        let values = [self.pm25_safe, self.pm25_moderate, self.pm25_danger];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("thresholds must be finite numbers".to_string());
        }
        if !(self.pm25_safe < self.pm25_moderate && self.pm25_moderate < self.pm25_danger) {
            return Err(format!(
                "thresholds must be ascending: pm25_safe ({}) < pm25_moderate ({}) < pm25_danger ({})",
                self.pm25_safe, self.pm25_moderate, self.pm25_danger
            ));
        }
        Ok(())
    }

    /// Bucket a PM2.5 value; `None` maps to [`Category::NoData`].
    pub fn categorize(&self, pm25: Option<f64>) -> Category {
        // ---
        match pm25 {
            None => Category::NoData,
            Some(v) if v.is_nan() => Category::NoData,
            Some(v) if v <= self.pm25_safe => Category::Safe,
            Some(v) if v <= self.pm25_moderate => Category::Moderate,
            Some(v) if v <= self.pm25_danger => Category::Unhealthy,
            Some(_) => Category::Dangerous,
        }
    }
}
