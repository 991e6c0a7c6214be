//! # Axe Types
//!
//! Shared domain entities and external-collaborator traits for the Axe
//! overlay protocol: the derived, application-specific chain that runs
//! atop an authoritative upstream network ("Breeze").
//!
//! ## Design Principles
//!
//! - Single source of truth for cross-crate types (`Action`, `ActionArray`,
//!   `ActionBlock`, `BlockHeader`, `Hash`).
//! - External collaborators (crypto, byte-store, durable state, signed
//!   connections) are narrow traits, not concrete implementations — see
//!   `ports` and `traits`.

pub mod action;
pub mod block;
pub mod hash;
pub mod ports;
pub mod traits;

pub use action::{Action, ActionArray, ActionArrayError};
pub use block::{ActionBlock, BlockHeader, BlockStatus};
pub use hash::{hash_bytes, Hash, Identity, Signature};
pub use ports::{
    accept_all_connections, loopback_pair, BoxedConnection, ByteStore, Channel,
    ConnectionValidator, InMemoryByteStore, PortError, SignedConnection,
};
pub use traits::{Blocker, DurableState, Mutations, ProtocolTagExtractor};
