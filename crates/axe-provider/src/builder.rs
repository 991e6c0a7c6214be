//! Per-epoch block builders (spec §4.G), grounded on the source's
//! `ProtocolBuilder`/`NewProtocolBuilder`/`AddAction`/`Finalize` sequence.

use std::collections::HashMap;

use axe_types::{ActionArray, Hash, Identity, Signature};
use tracing::warn;

use crate::persisted::{self, PersistedBlockError};

/// Accumulates actions for one in-flight epoch until it is sealed and
/// committed.
pub struct ProtocolBuilder {
    epoch: u64,
    actions: Vec<Vec<u8>>,
}

impl ProtocolBuilder {
    pub fn new(epoch: u64) -> Self {
        ProtocolBuilder {
            epoch,
            actions: Vec::new(),
        }
    }

    pub fn add_action(&mut self, action: Vec<u8>) {
        self.actions.push(action);
    }

    /// The same action-array hash `ChainEngine::seal_block` computes over
    /// its Live block (spec §4.D `sealBlock`, test scenario 1): u32 count
    /// then each action u16-length-prefixed, zero hash for an empty array.
    pub fn own_hash(&self) -> Hash {
        let mut array = ActionArray::new();
        for action in &self.actions {
            array.append(action);
        }
        array.hash()
    }

    /// Records the sealer's claimed content hash and checks it against the
    /// builder's own recomputed action-array hash (spec §4.G "On
    /// BlockSealed(epoch, hash): verify the builder's tentative seal
    /// equals the supplied hash"). Returns whether they matched.
    pub fn set_tentative_seal(&mut self, hash: Hash) -> bool {
        self.own_hash() == hash
    }

    pub fn finalize(
        &self,
        publisher: Identity,
        sign: impl FnOnce(&Hash) -> Signature,
    ) -> Result<Vec<u8>, PersistedBlockError> {
        persisted::finalize(self.epoch, &self.actions, publisher, sign)
    }
}

/// Keyed by epoch: one active builder per in-flight block.
#[derive(Default)]
pub struct BuilderMap {
    builders: HashMap<u64, ProtocolBuilder>,
}

impl BuilderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, epoch: u64) {
        self.builders.insert(epoch, ProtocolBuilder::new(epoch));
    }

    pub fn append(&mut self, epoch: u64, action: Vec<u8>) {
        match self.builders.get_mut(&epoch) {
            Some(builder) => builder.add_action(action),
            None => warn!(epoch, "action for epoch with no active builder"),
        }
    }

    /// Returns `Some(true)`/`Some(false)` for a matched/mismatched seal, or
    /// `None` if no builder is active for `epoch`. A mismatched builder is
    /// dropped from the map: it can never validly reach Commit (spec
    /// §4.G).
    pub fn set_tentative_seal(&mut self, epoch: u64, hash: Hash) -> Option<bool> {
        let matched = match self.builders.get_mut(&epoch) {
            Some(builder) => builder.set_tentative_seal(hash),
            None => {
                warn!(epoch, "seal for epoch with no active builder");
                return None;
            }
        };
        if !matched {
            self.builders.remove(&epoch);
        }
        Some(matched)
    }

    /// Removes and returns the builder for `epoch`, if any is pending.
    pub fn take(&mut self, epoch: u64) -> Option<ProtocolBuilder> {
        self.builders.remove(&epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_builder_action_is_dropped_not_panicked() {
        let mut map = BuilderMap::new();
        map.append(5, b"orphan".to_vec());
        assert!(map.take(5).is_none());
    }

    #[test]
    fn matching_seal_keeps_builder() {
        let mut map = BuilderMap::new();
        map.start(1);
        map.append(1, b"a1".to_vec());
        let own_hash = map.builders.get(&1).unwrap().own_hash();
        assert_eq!(map.set_tentative_seal(1, own_hash), Some(true));
        assert!(map.take(1).is_some());
    }

    #[test]
    fn mismatched_seal_drops_builder() {
        let mut map = BuilderMap::new();
        map.start(1);
        map.append(1, b"a1".to_vec());
        assert_eq!(map.set_tentative_seal(1, Hash::ZERO), Some(false));
        assert!(map.take(1).is_none());
    }

    #[test]
    fn builder_finalizes_with_accumulated_actions() {
        let mut map = BuilderMap::new();
        map.start(1);
        map.append(1, b"a1".to_vec());
        map.append(1, b"a2".to_vec());
        let builder = map.take(1).unwrap();
        let bytes = builder.finalize([9u8; 32], |_| [0u8; 64]).unwrap();
        let parsed = persisted::parse(&bytes).unwrap();
        assert_eq!(parsed.actions, vec![b"a1".to_vec(), b"a2".to_vec()]);
    }
}
