//! The replica mode's [`axe_sync::BlockSink`]: persists every block the
//! sync coordinator hands over into a local append-only log, the same
//! format `axe_provider` writes (spec §4.G, §4.I), so the replica can turn
//! around and serve its own late subscribers from it.
//!
//! The block already carries its own hash/publisher/signature from the
//! network it was sourced from — unlike `BlockProvider::apply`, there is
//! no local signing step, just re-serialization of the already-finalized
//! fields (spec §3 "Persisted block").

use axe_provider::{BlockLog, PersistedBlock};
use axe_sync::BlockSink;
use axe_types::ByteStore;
use parking_lot::Mutex;
use tracing::warn;

pub struct LogSink<S: ByteStore> {
    log: Mutex<BlockLog<S>>,
}

impl<S: ByteStore> LogSink<S> {
    pub fn new(log: BlockLog<S>) -> Self {
        LogSink { log: Mutex::new(log) }
    }
}

impl<S: ByteStore + Send + Sync> BlockSink for LogSink<S> {
    fn epoch(&self) -> u64 {
        self.log.lock().last_epoch()
    }

    fn add_block(&self, block: PersistedBlock) {
        let bytes = encode(&block);
        if let Err(err) = self.log.lock().append(block.epoch, &bytes) {
            warn!(epoch = block.epoch, %err, "replica: failed to persist synced block");
        }
    }
}

/// Mirrors `axe_provider::persisted`'s on-disk layout exactly, so the
/// bytes this writes parse back with `axe_provider::parse_block`.
fn encode(block: &PersistedBlock) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&block.epoch.to_le_bytes());
    for action in &block.actions {
        out.extend_from_slice(&(action.len() as u16).to_le_bytes());
        out.extend_from_slice(action);
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(block.hash.as_bytes());
    out.extend_from_slice(&block.publisher);
    out.extend_from_slice(&block.signature);
    out
}
