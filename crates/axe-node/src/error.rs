//! Node-level errors delivered on the completion channel (spec §5
//! "Cancellation": each component exposes a single completion channel
//! delivering the first unrecoverable error).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("upstream listener failed: {0}")]
    Upstream(String),
    #[error("accept loop failed: {0}")]
    Accept(String),
}
