//! Telemetry configuration from environment variables, grounded on
//! `quantum-telemetry::config::TelemetryConfig::from_env`.

use std::env;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// Emit newline-delimited JSON instead of the human-readable format.
    pub json_logs: bool,
    /// Port the Prometheus text endpoint is served on by the caller.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "axe-node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_port: 9100,
        }
    }
}

impl TelemetryConfig {
    /// Reads `AXE_SERVICE_NAME`, `AXE_LOG_LEVEL`/`RUST_LOG`, `AXE_JSON_LOGS`,
    /// `AXE_METRICS_PORT`, falling back to sensible defaults.
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("AXE_SERVICE_NAME").unwrap_or_else(|_| "axe-node".to_string()),
            log_level: env::var("AXE_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("AXE_JSON_LOGS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            metrics_port: env::var("AXE_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "axe-node");
        assert_eq!(config.metrics_port, 9100);
    }
}
