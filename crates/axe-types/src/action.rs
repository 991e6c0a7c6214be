//! `Action` and `ActionArray` — the in-memory block content (spec §3, §4.B).

use crate::hash::{hash_bytes, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An opaque action. Carries a protocol tag in a fixed prefix, extracted by
/// a pluggable [`crate::traits::ProtocolTagExtractor`] (spec §3, §6).
pub type Action = Vec<u8>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionArrayError {
    #[error("action array truncated: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("action length {len} exceeds u16 bound")]
    ActionTooLarge { len: usize },
}

/// Ordered, append-only container of actions.
///
/// Bytes are concatenated with a parallel offset vector recording the
/// exclusive end of each action, so indexed access is a subslice rather
/// than a per-action allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionArray {
    data: Vec<u8>,
    offsets: Vec<usize>,
}

impl ActionArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Indexed read. Out-of-range is a silent `None`, mirroring the
    /// source's nil-return-as-end-of-stream convention (spec §4.B).
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        if index >= self.offsets.len() {
            return None;
        }
        let start = if index == 0 { 0 } else { self.offsets[index - 1] };
        let end = self.offsets[index];
        Some(&self.data[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.len()).map(move |i| self.get(i).expect("index within len"))
    }

    pub fn append(&mut self, action: &[u8]) {
        self.data.extend_from_slice(action);
        self.offsets.push(self.data.len());
    }

    /// Canonical serialization: u32 count, then each action as a
    /// u16-length-prefix followed by its bytes (spec §4.B).
    pub fn serialize(&self) -> Result<Vec<u8>, ActionArrayError> {
        let mut out = Vec::with_capacity(4 + self.data.len() + 2 * self.len());
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for i in 0..self.len() {
            let action = self.get(i).expect("index within len");
            if action.len() > u16::MAX as usize {
                return Err(ActionArrayError::ActionTooLarge { len: action.len() });
            }
            out.extend_from_slice(&(action.len() as u16).to_le_bytes());
            out.extend_from_slice(action);
        }
        Ok(out)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ActionArrayError> {
        if bytes.len() < 4 {
            return Err(ActionArrayError::Truncated {
                expected: 4,
                found: bytes.len(),
            });
        }
        let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut pos = 4;
        let mut array = ActionArray::new();
        for _ in 0..count {
            if bytes.len() < pos + 2 {
                return Err(ActionArrayError::Truncated {
                    expected: pos + 2,
                    found: bytes.len(),
                });
            }
            let len = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap()) as usize;
            pos += 2;
            if bytes.len() < pos + len {
                return Err(ActionArrayError::Truncated {
                    expected: pos + len,
                    found: bytes.len(),
                });
            }
            array.append(&bytes[pos..pos + len]);
            pos += len;
        }
        Ok(array)
    }

    /// Hash of the canonical serialized form. Returns [`Hash::ZERO`] for an
    /// empty array, matching the source's `SealBlock` short-circuit.
    pub fn hash(&self) -> Hash {
        if self.is_empty() {
            return Hash::ZERO;
        }
        // Serialization of an already-built array never overflows the
        // u16 action-length bound checked at `append` call sites upstream.
        let bytes = self.serialize().expect("in-memory array is within bounds");
        hash_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_matches_bytewise_and_hash() {
        let mut arr = ActionArray::new();
        arr.append(b"alpha");
        arr.append(b"beta");
        arr.append(b"");
        let bytes = arr.serialize().unwrap();
        let parsed = ActionArray::deserialize(&bytes).unwrap();
        assert_eq!(arr, parsed);
        assert_eq!(arr.hash(), parsed.hash());
    }

    #[test]
    fn empty_array_hashes_to_zero() {
        assert_eq!(ActionArray::new().hash(), Hash::ZERO);
    }

    #[test]
    fn out_of_range_index_is_none() {
        let mut arr = ActionArray::new();
        arr.append(b"only");
        assert!(arr.get(1).is_none());
    }

    #[test]
    fn truncated_bytes_fail_to_parse() {
        let mut arr = ActionArray::new();
        arr.append(b"x");
        let mut bytes = arr.serialize().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(ActionArray::deserialize(&bytes).is_err());
    }
}
