//! The on-wire control frames for the derived-protocol stream (spec §4.A).

use axe_types::{Action, ActionArray, ActionArrayError, Hash, Identity, Signature};
use thiserror::Error;

use crate::wire::{
    put_block, put_hash, put_hash_array, put_identity, put_signature, put_u64, Cursor,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("empty frame: no tag byte")]
    EmptyFrame,
    #[error("unknown frame tag {0}")]
    UnknownTag(u8),
    #[error("invalid action array payload: {0}")]
    ActionArray(#[from] ActionArrayError),
    #[error("non-utf8 sync error message")]
    NonUtf8Message,
}

/// One-byte tags distinguishing frame kinds (spec §4.A table).
pub mod tag {
    pub const NEW_BLOCK: u8 = 0;
    pub const ACTION: u8 = 1;
    pub const ACTION_ARRAY: u8 = 2;
    pub const SEAL_BLOCK: u8 = 3;
    pub const COMMIT_BLOCK: u8 = 4;
    pub const BLOCK_SEALED: u8 = 5;
    pub const BLOCK_COMMITTED: u8 = 6;
    pub const ACTION_SUBMIT: u8 = 7;
    pub const SYNC_REQUEST: u8 = 8;
    pub const SYNC_ERROR: u8 = 9;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockHeaderFrame {
    pub epoch: u64,
    pub checkpoint_epoch: u64,
    pub checkpoint_hash: Hash,
    pub proposer: Identity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SealFrame {
    pub epoch: u64,
    pub hash: Hash,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitFrame {
    pub epoch: u64,
    pub invalidated: Vec<Hash>,
    pub publisher: Identity,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SealedBlockFrame {
    pub header: BlockHeaderFrame,
    pub actions: ActionArray,
    pub seal: SealFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedBlockFrame {
    pub header: BlockHeaderFrame,
    pub actions: ActionArray,
    pub seal: SealFrame,
    pub commit: CommitFrame,
}

/// A decoded derived-protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    NewBlock(BlockHeaderFrame),
    Action(Action),
    ActionArray(ActionArray),
    SealBlock(SealFrame),
    CommitBlock(CommitFrame),
    BlockSealed(SealedBlockFrame),
    BlockCommitted(CommittedBlockFrame),
    ActionSubmit(Action),
    SyncRequest { epoch: u64 },
    SyncError(String),
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Frame::NewBlock(h) => {
                out.push(tag::NEW_BLOCK);
                encode_header(&mut out, h);
            }
            Frame::Action(action) => {
                out.push(tag::ACTION);
                out.extend_from_slice(action);
            }
            Frame::ActionArray(arr) => {
                out.push(tag::ACTION_ARRAY);
                out.extend_from_slice(&arr.serialize().expect("in-bounds action array"));
            }
            Frame::SealBlock(seal) => {
                out.push(tag::SEAL_BLOCK);
                encode_seal(&mut out, seal);
            }
            Frame::CommitBlock(commit) => {
                out.push(tag::COMMIT_BLOCK);
                encode_commit(&mut out, commit);
            }
            Frame::BlockSealed(b) => {
                out.push(tag::BLOCK_SEALED);
                encode_header(&mut out, &b.header);
                put_block(&mut out, &b.actions.serialize().expect("in-bounds action array"));
                encode_seal(&mut out, &b.seal);
            }
            Frame::BlockCommitted(b) => {
                out.push(tag::BLOCK_COMMITTED);
                encode_header(&mut out, &b.header);
                put_block(&mut out, &b.actions.serialize().expect("in-bounds action array"));
                encode_seal(&mut out, &b.seal);
                encode_commit(&mut out, &b.commit);
            }
            Frame::ActionSubmit(action) => {
                out.push(tag::ACTION_SUBMIT);
                out.extend_from_slice(action);
            }
            Frame::SyncRequest { epoch } => {
                out.push(tag::SYNC_REQUEST);
                put_u64(&mut out, *epoch);
            }
            Frame::SyncError(message) => {
                out.push(tag::SYNC_ERROR);
                out.extend_from_slice(message.as_bytes());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Frame, CodecError> {
        let (&first, rest) = bytes.split_first().ok_or(CodecError::EmptyFrame)?;
        let mut cursor = Cursor::new(rest);
        let frame = match first {
            tag::NEW_BLOCK => Frame::NewBlock(decode_header(&mut cursor)?),
            tag::ACTION => Frame::Action(cursor.rest().to_vec()),
            tag::ACTION_ARRAY => Frame::ActionArray(ActionArray::deserialize(cursor.rest())?),
            tag::SEAL_BLOCK => Frame::SealBlock(decode_seal(&mut cursor)?),
            tag::COMMIT_BLOCK => Frame::CommitBlock(decode_commit(&mut cursor)?),
            tag::BLOCK_SEALED => {
                let header = decode_header(&mut cursor)?;
                let actions = ActionArray::deserialize(cursor.get_block()?)?;
                let seal = decode_seal(&mut cursor)?;
                Frame::BlockSealed(SealedBlockFrame {
                    header,
                    actions,
                    seal,
                })
            }
            tag::BLOCK_COMMITTED => {
                let header = decode_header(&mut cursor)?;
                let actions = ActionArray::deserialize(cursor.get_block()?)?;
                let seal = decode_seal(&mut cursor)?;
                let commit = decode_commit(&mut cursor)?;
                Frame::BlockCommitted(CommittedBlockFrame {
                    header,
                    actions,
                    seal,
                    commit,
                })
            }
            tag::ACTION_SUBMIT => Frame::ActionSubmit(cursor.rest().to_vec()),
            tag::SYNC_REQUEST => Frame::SyncRequest {
                epoch: cursor.get_u64()?,
            },
            tag::SYNC_ERROR => Frame::SyncError(
                String::from_utf8(cursor.rest().to_vec()).map_err(|_| CodecError::NonUtf8Message)?,
            ),
            other => return Err(CodecError::UnknownTag(other)),
        };
        Ok(frame)
    }
}

fn encode_header(out: &mut Vec<u8>, h: &BlockHeaderFrame) {
    put_u64(out, h.epoch);
    put_u64(out, h.checkpoint_epoch);
    put_hash(out, &h.checkpoint_hash);
    put_identity(out, &h.proposer);
}

fn decode_header(cursor: &mut Cursor<'_>) -> Result<BlockHeaderFrame, CodecError> {
    Ok(BlockHeaderFrame {
        epoch: cursor.get_u64()?,
        checkpoint_epoch: cursor.get_u64()?,
        checkpoint_hash: cursor.get_hash()?,
        proposer: cursor.get_identity()?,
    })
}

fn encode_seal(out: &mut Vec<u8>, seal: &SealFrame) {
    put_u64(out, seal.epoch);
    put_hash(out, &seal.hash);
    put_signature(out, &seal.signature);
}

fn decode_seal(cursor: &mut Cursor<'_>) -> Result<SealFrame, CodecError> {
    Ok(SealFrame {
        epoch: cursor.get_u64()?,
        hash: cursor.get_hash()?,
        signature: cursor.get_signature()?,
    })
}

fn encode_commit(out: &mut Vec<u8>, commit: &CommitFrame) {
    put_u64(out, commit.epoch);
    put_hash_array(out, &commit.invalidated);
    put_identity(out, &commit.publisher);
    put_signature(out, &commit.signature);
}

fn decode_commit(cursor: &mut Cursor<'_>) -> Result<CommitFrame, CodecError> {
    Ok(CommitFrame {
        epoch: cursor.get_u64()?,
        invalidated: cursor.get_hash_array()?,
        publisher: cursor.get_identity()?,
        signature: cursor.get_signature()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_array() -> ActionArray {
        let mut arr = ActionArray::new();
        arr.append(b"a1");
        arr.append(b"a2");
        arr
    }

    #[test]
    fn new_block_round_trips() {
        let frame = Frame::NewBlock(BlockHeaderFrame {
            epoch: 7,
            checkpoint_epoch: 3,
            checkpoint_hash: Hash::from_bytes([9u8; 32]),
            proposer: [4u8; 32],
        });
        let bytes = frame.encode();
        assert_eq!(bytes[0], tag::NEW_BLOCK);
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn block_committed_round_trips() {
        let frame = Frame::BlockCommitted(CommittedBlockFrame {
            header: BlockHeaderFrame {
                epoch: 5,
                checkpoint_epoch: 4,
                checkpoint_hash: Hash::ZERO,
                proposer: [1u8; 32],
            },
            actions: sample_array(),
            seal: SealFrame {
                epoch: 5,
                hash: Hash::from_bytes([2u8; 32]),
                signature: [3u8; 64],
            },
            commit: CommitFrame {
                epoch: 5,
                invalidated: vec![Hash::from_bytes([5u8; 32])],
                publisher: [6u8; 32],
                signature: [7u8; 64],
            },
        });
        let bytes = frame.encode();
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn sync_request_round_trips() {
        let frame = Frame::SyncRequest { epoch: 42 };
        assert_eq!(Frame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn empty_bytes_is_an_error() {
        assert_eq!(Frame::decode(&[]).unwrap_err(), CodecError::EmptyFrame);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert_eq!(
            Frame::decode(&[250]).unwrap_err(),
            CodecError::UnknownTag(250)
        );
    }

    #[test]
    fn truncated_new_block_is_an_error() {
        let bytes = vec![tag::NEW_BLOCK, 1, 2, 3];
        assert!(Frame::decode(&bytes).is_err());
    }
}
