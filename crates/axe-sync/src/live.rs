//! Reassembles the live protocol-node signal stream into whole blocks
//! (spec §4.I), grounded on `social/listener.go`'s
//! `NewBlockSignal -> ActionArraySignal -> SealSignal -> CommitSignal`
//! sequence: the commit signal's publisher/signature are exactly the
//! persisted block's own, so no local signing key is needed here.

use axe_listener::Signal;
use axe_provider::PersistedBlock;
use axe_types::Hash;

#[derive(Default)]
pub struct LiveAssembler {
    epoch: Option<u64>,
    actions: Vec<Vec<u8>>,
    hash: Option<Hash>,
}

impl LiveAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one signal. Returns the finished block once a matching
    /// `Commit` closes out the epoch opened by the most recent `NewBlock`.
    pub fn feed(&mut self, signal: Signal) -> Option<PersistedBlock> {
        match signal {
            Signal::NewBlock(header) => {
                self.epoch = Some(header.epoch);
                self.actions.clear();
                self.hash = None;
                None
            }
            Signal::Action(action) => {
                self.actions.push(action);
                None
            }
            Signal::ActionArray(arr) => {
                for action in arr.iter() {
                    self.actions.push(action.to_vec());
                }
                None
            }
            Signal::Seal(seal) => {
                self.hash = Some(seal.hash);
                None
            }
            Signal::Commit(commit) => {
                let epoch = self.epoch?;
                let hash = self.hash?;
                Some(PersistedBlock {
                    epoch,
                    actions: std::mem::take(&mut self.actions),
                    hash,
                    publisher: commit.publisher,
                    signature: commit.signature,
                })
            }
            Signal::Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_codec::{BlockHeaderFrame, CommitFrame, SealFrame};
    use axe_types::Hash as TypesHash;

    #[test]
    fn assembles_header_actions_seal_commit_into_one_block() {
        let mut assembler = LiveAssembler::new();
        assert!(assembler
            .feed(Signal::NewBlock(BlockHeaderFrame {
                epoch: 3,
                checkpoint_epoch: 2,
                checkpoint_hash: TypesHash::ZERO,
                proposer: [1u8; 32],
            }))
            .is_none());
        assert!(assembler.feed(Signal::Action(b"a1".to_vec())).is_none());
        assert!(assembler
            .feed(Signal::Seal(SealFrame {
                epoch: 3,
                hash: TypesHash::from_bytes([7u8; 32]),
                signature: [0u8; 64],
            }))
            .is_none());
        let block = assembler
            .feed(Signal::Commit(CommitFrame {
                epoch: 3,
                invalidated: vec![],
                publisher: [5u8; 32],
                signature: [6u8; 64],
            }))
            .unwrap();
        assert_eq!(block.epoch, 3);
        assert_eq!(block.actions, vec![b"a1".to_vec()]);
        assert_eq!(block.hash, TypesHash::from_bytes([7u8; 32]));
        assert_eq!(block.publisher, [5u8; 32]);
        assert_eq!(block.signature, [6u8; 64]);
    }

    #[test]
    fn commit_without_seal_is_dropped_not_panicked() {
        let mut assembler = LiveAssembler::new();
        assembler.feed(Signal::NewBlock(BlockHeaderFrame {
            epoch: 1,
            checkpoint_epoch: 0,
            checkpoint_hash: TypesHash::ZERO,
            proposer: [0u8; 32],
        }));
        let result = assembler.feed(Signal::Commit(CommitFrame {
            epoch: 1,
            invalidated: vec![],
            publisher: [0u8; 32],
            signature: [0u8; 64],
        }));
        assert!(result.is_none());
    }
}
