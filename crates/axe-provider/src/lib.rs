//! # Axe Provider
//!
//! The Block Provider (spec §4.G): accumulates upstream signals into
//! per-epoch block builders, persists finalized blocks to an append-only
//! log, and answers subscriber handshakes with bulk historical transmission
//! followed by a live tail.

mod builder;
mod log;
mod persisted;
mod provider;
mod transmit;

pub use builder::{BuilderMap, ProtocolBuilder};
pub use log::{BlockIndex, BlockLog, BlockLogError};
pub use persisted::{finalize as finalize_block, parse as parse_block, PersistedBlock, PersistedBlockError};
pub use provider::{accept_subscribers, BlockProvider, IncomingSubscriber};
pub use transmit::{transmit_blocks, END_OF_TRANSMISSION};
