//! Application entry point for the `aether-aqms` service.
//!
//! Reads `.env` and the environment, loads the whitelist, historical data
//! and realtime log, then serves the `routes` gateway until Ctrl-C.
//!
//! # Environment Variables
//! - `AETHER_CONFIG_PATH` (optional) – server config JSON (default: `config/server_config.json`)
//! - `AETHER_SENSORS_PATH` (optional) – sensor whitelist JSON (default: `config/sensors.json`)
//! - `AETHER_BIND_ADDR` (optional) – listen address (default: `0.0.0.0:8080`)
//! - `AETHER_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AETHER_SPAN_EVENTS` (optional) – `full` or `enter_exit` span events
//! - `FORCE_COLOR` (optional) – force ANSI colors on or off
//!
//! Any failure to read the configuration, whitelist or historical data is
//! fatal. A corrupt realtime log is not.
use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use aether_aqms::{config, routes, SensorService};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let service = SensorService::bootstrap(&cfg).context("Failed to initialize sensor service")?;
    tracing::info!(
        "Service ready: {} sensors registered, {} readings restored",
        service.registry().len(),
        service.total_readings()
    );

    let app = routes::router(routes::AppState::new(service));

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ---

/// Install the global subscriber. `RUST_LOG` wins over `AETHER_LOG_LEVEL`.
fn init_tracing() {
    // ---
    let env_filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(format!(
            "{},hyper=info",
            log_level(env::var("AETHER_LOG_LEVEL").ok().as_deref())
        )),
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events(env::var("AETHER_SPAN_EVENTS").ok().as_deref()))
        .with_env_filter(env_filter)
        .with_ansi(use_color(env::var("FORCE_COLOR").ok().as_deref()))
        .compact()
        .init();
}

/// Unknown levels fall back to `debug`.
fn log_level(raw: Option<&str>) -> &'static str {
    match raw {
        Some("trace") => "trace",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => "debug",
    }
}

/// `full` or `enter_exit`; anything else logs span close only.
fn span_events(raw: Option<&str>) -> FmtSpan {
    match raw {
        Some("full") => FmtSpan::FULL,
        Some("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    }
}

/// `FORCE_COLOR` overrides terminal detection on stdout.
fn use_color(raw: Option<&str>) -> bool {
    match raw {
        Some("1" | "true" | "yes") => true,
        Some("0" | "false" | "no") => false,
        _ => std::io::stdout().is_terminal(),
    }
}
