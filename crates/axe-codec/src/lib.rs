//! # Axe Codec
//!
//! Encodes and decodes the one-byte-tag control frames exchanged on the
//! upstream and downstream derived-protocol wire (spec §4.A). Byte-level
//! framing of primitive types beyond what these frames need is an
//! external collaborator (spec §1); this crate only assembles the frame
//! shapes spec.md names.

mod frame;
mod wire;

pub use frame::{
    BlockHeaderFrame, CodecError, CommitFrame, CommittedBlockFrame, Frame, SealFrame,
    SealedBlockFrame, tag,
};
pub use wire::Cursor;
