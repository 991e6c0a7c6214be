//! `tracing-subscriber` initialization, grounded on
//! `quantum-telemetry::tracing_setup::init_tracing`, trimmed to the
//! env-filter + fmt layer (no OpenTelemetry/Tempo export in this workspace).

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::TelemetryConfig;
use crate::TelemetryError;

/// Held for the process lifetime; dropping it is a no-op but gives callers
/// something RAII-shaped to bind, matching the teacher's guard pattern.
pub struct TracingGuard;

pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|err| TelemetryError::Config(err.to_string()))?;

    let result = if config.json_logs {
        fmt().with_env_filter(filter).with_target(true).json().try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };
    result.map_err(|err| TelemetryError::TracerInit(err.to_string()))?;

    Ok(TracingGuard)
}
