use thiserror::Error;

/// Startup failures, mirroring the two fatal paths in the gateway's
/// original bring-up sequence: binding the client listen port and dialing
/// upstream.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("could not listen for clients: {0}")]
    Listen(String),
    #[error("could not connect to upstream: {0}")]
    Connect(String),
}
