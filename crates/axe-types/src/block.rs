//! Block header and the `ActionBlock` lifecycle unit (spec §3).

use crate::action::ActionArray;
use crate::hash::{Hash, Identity};
use serde::{Deserialize, Serialize};

/// Epoch ‖ checkpoint epoch ‖ checkpoint hash ‖ proposer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub epoch: u64,
    pub checkpoint_epoch: u64,
    pub checkpoint_hash: Hash,
    pub proposer: Identity,
}

/// Block lifecycle status. Variant order is the monotonic lifecycle order
/// (spec §3 invariant I3): `Live < Done < Sealed < Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockStatus {
    Live,
    Done,
    Sealed,
    Commit,
}

/// The core unit of the derived chain.
///
/// `mutations` is an opaque snapshot produced by the state engine at
/// commit time; it is `None` until the block reaches [`BlockStatus::Commit`].
#[derive(Debug, Clone)]
pub struct ActionBlock<M> {
    pub epoch: u64,
    pub checkpoint_epoch: u64,
    pub origin: Hash,
    pub actions: ActionArray,
    pub invalidated: Vec<Hash>,
    pub status: BlockStatus,
    pub mutations: Option<M>,
}

impl<M> ActionBlock<M> {
    pub fn new(header: BlockHeader) -> Self {
        ActionBlock {
            epoch: header.epoch,
            checkpoint_epoch: header.checkpoint_epoch,
            origin: header.checkpoint_hash,
            actions: ActionArray::new(),
            invalidated: Vec::new(),
            status: BlockStatus::Live,
            mutations: None,
        }
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            epoch: self.epoch,
            checkpoint_epoch: self.checkpoint_epoch,
            checkpoint_hash: self.origin,
            // Sync only needs a header for `NewBlock` framing; proposer is
            // reconstructed by callers that track it separately (the
            // upstream listener keeps it in the `Signal`, not the block).
            proposer: [0u8; 32],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_monotonic_orderable() {
        assert!(BlockStatus::Live < BlockStatus::Done);
        assert!(BlockStatus::Done < BlockStatus::Sealed);
        assert!(BlockStatus::Sealed < BlockStatus::Commit);
    }

    #[test]
    fn new_block_starts_live_with_no_mutations() {
        let header = BlockHeader {
            epoch: 1,
            checkpoint_epoch: 0,
            checkpoint_hash: Hash::ZERO,
            proposer: [1u8; 32],
        };
        let block: ActionBlock<()> = ActionBlock::new(header);
        assert_eq!(block.status, BlockStatus::Live);
        assert!(block.mutations.is_none());
        assert_eq!(block.epoch, 1);
    }
}
