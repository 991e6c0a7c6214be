//! # Axe Telemetry
//!
//! Structured logging and Prometheus metrics for the axe workspace,
//! grounded on `quantum-telemetry`, trimmed to this workspace's scale: no
//! OpenTelemetry/Tempo trace export, just `tracing-subscriber` plus a
//! Prometheus registry (see DESIGN.md for the dependency-drop rationale).

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_text, register_metrics, ACTIONS_REJECTED, ACTIONS_VALIDATED, BLOCKS_COMMITTED,
    BLOCKS_INCORPORATED, GATEWAY_ACTIONS_FORWARDED, GATEWAY_SHUTDOWNS, LIVE_EPOCH, ROLLBACKS,
    SUBSCRIBERS_CONNECTED, SUBSCRIBERS_PRUNED,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracerInit(String),
    #[error("failed to initialize metrics registry: {0}")]
    MetricsInit(String),
    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}

/// Initializes logging and metrics. Returns a guard that should be held for
/// the process lifetime.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    let tracing = tracing_setup::init_tracing(config)?;
    Ok(TelemetryGuard { _tracing: tracing })
}

pub struct TelemetryGuard {
    _tracing: TracingGuard,
}
