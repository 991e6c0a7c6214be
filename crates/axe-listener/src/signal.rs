//! Typed signals emitted by the upstream listener (spec §4.E, §9).
//!
//! The source updates one heap-allocated signal struct in place and
//! signals the consumer via a channel carrying only a tag, which means the
//! consumer must fully drain a signal before the next tag arrives. Here
//! each signal carries its own payload as a sum type, so the channel alone
//! establishes ordering and there is no read-before-next-tag hazard.

use axe_codec::{BlockHeaderFrame, CommitFrame, SealFrame};
use axe_types::{Action, ActionArray};

/// One demultiplexed event from the upstream derived-protocol stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    NewBlock(BlockHeaderFrame),
    Action(Action),
    ActionArray(ActionArray),
    Seal(SealFrame),
    Commit(CommitFrame),
    /// The upstream connection failed or closed; carries the cause and
    /// terminates the listener's loop.
    Err(String),
}
