//! Engine errors. Every state-changing operation returns one of these,
//! naming the offending operation, epoch, and observed status where
//! applicable (spec §4.D, §7): "every state-changing operation returns a
//! typed error naming (operation, epoch, observed status) and leaves state
//! unchanged."

use axe_types::BlockStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("{operation}: block {epoch} not found")]
    BlockNotFound { operation: &'static str, epoch: u64 },

    #[error("{operation}: block {epoch} has status {status:?}")]
    WrongStatus {
        operation: &'static str,
        epoch: u64,
        status: BlockStatus,
    },

    #[error("new_block: expected epoch {expected}, got {got}")]
    NonSequentialNewBlock { expected: u64, got: u64 },

    #[error("new_block: invariant violated: {detail}")]
    InvariantViolation { detail: String },

    #[error("incorporate: non-sequential block epoch {epoch} vs state epoch {state_epoch}")]
    NonSequentialIncorporate { epoch: u64, state_epoch: u64 },

    #[error("rollback: target {target} is at or before state epoch {state_epoch}")]
    RollbackBeforeState { target: u64, state_epoch: u64 },

    #[error(
        "recover: target {target} outside [checksum {checksum_epoch}, state {state_epoch}]"
    )]
    RecoverOutOfRange {
        target: u64,
        checksum_epoch: u64,
        state_epoch: u64,
    },
}
