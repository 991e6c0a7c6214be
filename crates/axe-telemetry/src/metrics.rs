//! Prometheus metrics for the axe components, grounded on
//! `quantum-telemetry::metrics` (naming convention, lazy-static registry,
//! `gather`-to-text encode), scaled down to this workspace's components.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Blocks that reached Commit (spec §4.D).
    pub static ref BLOCKS_COMMITTED: Counter = Counter::new(
        "axe_chain_blocks_committed_total",
        "Total blocks committed by the chain engine"
    ).expect("metric creation failed");

    /// Blocks that reached Incorporate (spec §4.D).
    pub static ref BLOCKS_INCORPORATED: Counter = Counter::new(
        "axe_chain_blocks_incorporated_total",
        "Total blocks incorporated into durable state"
    ).expect("metric creation failed");

    /// Rollbacks performed on the chain engine (spec §4.D).
    pub static ref ROLLBACKS: Counter = Counter::new(
        "axe_chain_rollbacks_total",
        "Total rollback operations performed"
    ).expect("metric creation failed");

    /// The engine's current live epoch.
    pub static ref LIVE_EPOCH: Gauge = Gauge::new(
        "axe_chain_live_epoch",
        "The chain engine's current live epoch"
    ).expect("metric creation failed");

    /// Actions accepted by the current block validator.
    pub static ref ACTIONS_VALIDATED: Counter = Counter::new(
        "axe_chain_actions_validated_total",
        "Total actions accepted into the live block"
    ).expect("metric creation failed");

    /// Actions rejected by the current block validator (spec §7).
    pub static ref ACTIONS_REJECTED: Counter = Counter::new(
        "axe_chain_actions_rejected_total",
        "Total actions rejected by the block validator"
    ).expect("metric creation failed");

    /// Subscriber connections currently held by a node's pool (spec §4.F).
    pub static ref SUBSCRIBERS_CONNECTED: Gauge = Gauge::new(
        "axe_node_subscribers_connected",
        "Subscriber connections currently tracked by the pool"
    ).expect("metric creation failed");

    /// Subscribers pruned for a full outbound buffer (spec §9 prune policy).
    pub static ref SUBSCRIBERS_PRUNED: Counter = Counter::new(
        "axe_node_subscribers_pruned_total",
        "Total subscribers pruned as dead at a new-block boundary"
    ).expect("metric creation failed");

    /// Actions the gateway forwarded upstream (spec §4.H).
    pub static ref GATEWAY_ACTIONS_FORWARDED: Counter = Counter::new(
        "axe_gateway_actions_forwarded_total",
        "Total client-submitted actions forwarded to upstream"
    ).expect("metric creation failed");

    /// Graceful gateway shutdowns completed (spec §4.H).
    pub static ref GATEWAY_SHUTDOWNS: Counter = Counter::new(
        "axe_gateway_shutdowns_total",
        "Total graceful gateway shutdowns completed"
    ).expect("metric creation failed");
}

/// Registers every metric above with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_COMMITTED.clone()),
        Box::new(BLOCKS_INCORPORATED.clone()),
        Box::new(ROLLBACKS.clone()),
        Box::new(LIVE_EPOCH.clone()),
        Box::new(ACTIONS_VALIDATED.clone()),
        Box::new(ACTIONS_REJECTED.clone()),
        Box::new(SUBSCRIBERS_CONNECTED.clone()),
        Box::new(SUBSCRIBERS_PRUNED.clone()),
        Box::new(GATEWAY_ACTIONS_FORWARDED.clone()),
        Box::new(GATEWAY_SHUTDOWNS.clone()),
    ];
    for collector in collectors {
        REGISTRY
            .register(collector)
            .map_err(|err| TelemetryError::MetricsInit(err.to_string()))?;
    }
    Ok(())
}

/// Renders the current registry in the Prometheus text exposition format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|err| TelemetryError::MetricsInit(err.to_string()))?;
    String::from_utf8(buffer).map_err(|err| TelemetryError::MetricsInit(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_gather_includes_metric_names() {
        register_metrics().unwrap();
        BLOCKS_COMMITTED.inc();
        let text = gather_text().unwrap();
        assert!(text.contains("axe_chain_blocks_committed_total"));
    }
}
