//! The sortable unit the coordinator reorders (spec §4.I), grounded on
//! `topos/sync.go: BlockSorter` operating directly on whole
//! `*social.ProtocolBlock` values rather than granular signals.

use axe_chain::Epoched;
use axe_provider::PersistedBlock;

/// Wraps a finished block so it can be fed to [`axe_chain::BlockSorter`].
pub struct SyncBlock(pub PersistedBlock);

impl Epoched for SyncBlock {
    fn epoch(&self) -> u64 {
        self.0.epoch
    }
}
