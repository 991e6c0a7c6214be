//! On-disk persisted block layout (spec §3 "Persisted block", §4.G).
//!
//! `epoch ‖ length-prefixed action list ‖ trailing zero-length terminator
//! ‖ content hash ‖ publisher identity ‖ publisher signature`. The content
//! hash covers everything before it — epoch, actions, and the terminator —
//! computed over the frozen byte region, not a slice mutated mid-parse
//! (spec §9 redesign note b: a source parser reassigned its cursor
//! variable over the loop and hashed whatever it last pointed at).

use axe_types::{hash_bytes, Hash, Identity, Signature};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersistedBlockError {
    #[error("persisted block truncated: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("persisted block content hash mismatch")]
    HashMismatch,
    #[error("action length {len} exceeds u16 bound")]
    ActionTooLarge { len: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedBlock {
    pub epoch: u64,
    pub actions: Vec<Vec<u8>>,
    pub hash: Hash,
    pub publisher: Identity,
    pub signature: Signature,
}

/// Builds the hash-covered region: epoch, each action length-prefixed, and
/// a trailing zero-length terminator.
fn body_bytes(epoch: u64, actions: &[Vec<u8>]) -> Result<Vec<u8>, PersistedBlockError> {
    let mut out = Vec::new();
    out.extend_from_slice(&epoch.to_le_bytes());
    for action in actions {
        if action.len() > u16::MAX as usize {
            return Err(PersistedBlockError::ActionTooLarge { len: action.len() });
        }
        out.extend_from_slice(&(action.len() as u16).to_le_bytes());
        out.extend_from_slice(action);
    }
    out.extend_from_slice(&0u16.to_le_bytes()); // zero-length terminator
    Ok(out)
}

/// Finalizes a block: computes the content hash over `body_bytes`, then
/// appends hash ‖ publisher ‖ signature.
pub fn finalize(
    epoch: u64,
    actions: &[Vec<u8>],
    publisher: Identity,
    sign: impl FnOnce(&Hash) -> Signature,
) -> Result<Vec<u8>, PersistedBlockError> {
    let mut bytes = body_bytes(epoch, actions)?;
    let hash = hash_bytes(&bytes);
    let signature = sign(&hash);
    bytes.extend_from_slice(hash.as_bytes());
    bytes.extend_from_slice(&publisher);
    bytes.extend_from_slice(&signature);
    Ok(bytes)
}

/// Parses a persisted block, recomputing the content hash over the frozen
/// pre-seal region and comparing it against the embedded hash.
pub fn parse(bytes: &[u8]) -> Result<PersistedBlock, PersistedBlockError> {
    if bytes.len() < 8 {
        return Err(PersistedBlockError::Truncated {
            expected: 8,
            found: bytes.len(),
        });
    }
    let epoch = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let mut actions = Vec::new();
    let mut pos = 8;
    loop {
        if bytes.len() < pos + 2 {
            return Err(PersistedBlockError::Truncated {
                expected: pos + 2,
                found: bytes.len(),
            });
        }
        let len = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap()) as usize;
        pos += 2;
        if bytes.len() < pos + len {
            return Err(PersistedBlockError::Truncated {
                expected: pos + len,
                found: bytes.len(),
            });
        }
        if len == 0 {
            break;
        }
        actions.push(bytes[pos..pos + len].to_vec());
        pos += len;
    }
    let body_end = pos;
    if bytes.len() < body_end + 32 + 32 + 64 {
        return Err(PersistedBlockError::Truncated {
            expected: body_end + 32 + 32 + 64,
            found: bytes.len(),
        });
    }
    let computed = hash_bytes(&bytes[..body_end]);
    let hash = Hash::from_bytes(bytes[body_end..body_end + 32].try_into().unwrap());
    if hash != computed {
        return Err(PersistedBlockError::HashMismatch);
    }
    let publisher: Identity = bytes[body_end + 32..body_end + 64].try_into().unwrap();
    let signature: Signature = bytes[body_end + 64..body_end + 128].try_into().unwrap();
    Ok(PersistedBlock {
        epoch,
        actions,
        hash,
        publisher,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_then_parse_round_trips() {
        let actions = vec![b"a1".to_vec(), b"a2".to_vec()];
        let bytes = finalize(7, &actions, [1u8; 32], |_hash| [2u8; 64]).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.epoch, 7);
        assert_eq!(parsed.actions, actions);
        assert_eq!(parsed.publisher, [1u8; 32]);
        assert_eq!(parsed.signature, [2u8; 64]);
    }

    #[test]
    fn tampered_body_fails_hash_check() {
        let bytes = finalize(1, &[b"a".to_vec()], [0u8; 32], |_| [0u8; 64]).unwrap();
        let mut tampered = bytes.clone();
        tampered[8] ^= 0xff;
        assert_eq!(parse(&tampered).unwrap_err(), PersistedBlockError::HashMismatch);
    }

    #[test]
    fn empty_action_list_still_hashes() {
        let bytes = finalize(0, &[], [3u8; 32], |_| [4u8; 64]).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert!(parsed.actions.is_empty());
    }
}
