//! Runtime configuration from environment variables, grounded on the
//! teacher's `NodeConfig`/`TelemetryConfig::from_env` shape. Per spec §6,
//! the core defines no default listen ports or peer addresses: every
//! address below is required, and a missing one is a startup error rather
//! than a silently-assumed default.

use std::env;
use std::path::PathBuf;

use axe_types::Identity;
use thiserror::Error;

/// Default cap for one persisted-block-log file before rollover to the
/// next (spec §6 example: "e.g., 4 MiB").
const DEFAULT_BYTE_STORE_FILE_CAP: u64 = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Either half of the overlay network this process can run as: the
/// primary node (listener -> engine -> fan-out, plus its own provider and
/// gateway), or a replica that joins an already-running one (spec §4.I).
#[derive(Debug)]
pub enum Mode {
    Primary(PrimaryConfig),
    Replica(ReplicaConfig),
}

#[derive(Debug)]
pub struct PrimaryConfig {
    /// Address of the upstream authority ("Breeze") the listener and the
    /// gateway each dial independently (spec §4.E, §4.H).
    pub upstream_addr: String,
    /// Where the protocol node accepts subscriber connections (spec §4.F).
    pub subscriber_listen_addr: String,
    /// Where the block provider accepts historical-replay connections
    /// (spec §4.G).
    pub provider_listen_addr: String,
    /// Where the gateway accepts client connections (spec §4.H).
    pub gateway_listen_addr: String,
}

#[derive(Debug)]
pub struct ReplicaConfig {
    /// Address of a peer's block provider, for the historical catch-up
    /// stream (spec §4.I step 1).
    pub provider_addr: String,
    /// Address of a peer's protocol node, for the live tail (spec §4.I
    /// step 2).
    pub node_addr: String,
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub mode: Mode,
    /// Size of the engine's recent-blocks window (spec §3 "Recent-blocks
    /// window").
    pub keep_n_blocks: usize,
    /// This process's identity, used by the naive TCP handshake (spec §1:
    /// real signed-connection authentication is an external collaborator).
    pub self_identity: Identity,
    /// Address the health/status/metrics HTTP surface binds to.
    pub health_listen_addr: String,
    /// Directory the persisted block log's files live under (spec §1.3).
    pub data_dir: PathBuf,
    /// Cap, in bytes, on one persisted-block-log file before rollover to
    /// the next (spec §6).
    pub byte_store_file_cap: u64,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_identity(name: &'static str, value: &str) -> Result<Identity, ConfigError> {
    let bytes = hex::decode(value).map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })?;
    bytes.try_into().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

impl RuntimeConfig {
    /// Reads `AXE_MODE` (`primary` default, or `replica`) and the
    /// mode-specific addresses, plus `AXE_KEEP_N_BLOCKS` (default 64),
    /// `AXE_IDENTITY` (hex, random if unset), `AXE_HEALTH_LISTEN_ADDR`,
    /// `AXE_DATA_DIR` (required) and `AXE_BYTE_STORE_FILE_CAP` (default 4
    /// MiB).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode_name = env::var("AXE_MODE").unwrap_or_else(|_| "primary".to_string());
        let mode = match mode_name.as_str() {
            "primary" => Mode::Primary(PrimaryConfig {
                upstream_addr: required("AXE_UPSTREAM_ADDR")?,
                subscriber_listen_addr: required("AXE_SUBSCRIBER_LISTEN_ADDR")?,
                provider_listen_addr: required("AXE_PROVIDER_LISTEN_ADDR")?,
                gateway_listen_addr: required("AXE_GATEWAY_LISTEN_ADDR")?,
            }),
            "replica" => Mode::Replica(ReplicaConfig {
                provider_addr: required("AXE_PROVIDER_ADDR")?,
                node_addr: required("AXE_NODE_ADDR")?,
            }),
            other => {
                return Err(ConfigError::Invalid {
                    name: "AXE_MODE",
                    value: other.to_string(),
                })
            }
        };

        let keep_n_blocks = match env::var("AXE_KEEP_N_BLOCKS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "AXE_KEEP_N_BLOCKS",
                value: raw,
            })?,
            Err(_) => 64,
        };

        let self_identity = match env::var("AXE_IDENTITY") {
            Ok(raw) => parse_identity("AXE_IDENTITY", &raw)?,
            Err(_) => rand::random(),
        };

        let health_listen_addr =
            env::var("AXE_HEALTH_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:9100".to_string());

        let data_dir = PathBuf::from(required("AXE_DATA_DIR")?);

        let byte_store_file_cap = match env::var("AXE_BYTE_STORE_FILE_CAP") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "AXE_BYTE_STORE_FILE_CAP",
                value: raw,
            })?,
            Err(_) => DEFAULT_BYTE_STORE_FILE_CAP,
        };

        Ok(RuntimeConfig {
            mode,
            keep_n_blocks,
            self_identity,
            health_listen_addr,
            data_dir,
            byte_store_file_cap,
        })
    }
}
