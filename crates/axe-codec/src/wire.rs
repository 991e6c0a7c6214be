//! Little-endian primitive put/get helpers shared by every frame payload
//! (spec §4.A: "All multi-byte integers are little-endian").
//!
//! Byte-level framing of primitive types is ordinarily an external
//! collaborator (spec §1); these helpers are the thin, crate-local
//! equivalent needed to assemble the frames this layer actually defines.

use axe_types::{Hash, Identity, Signature};

use crate::CodecError;

pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn put_hash(out: &mut Vec<u8>, hash: &Hash) {
    out.extend_from_slice(hash.as_bytes());
}

pub fn put_identity(out: &mut Vec<u8>, id: &Identity) {
    out.extend_from_slice(id);
}

pub fn put_signature(out: &mut Vec<u8>, sig: &Signature) {
    out.extend_from_slice(sig);
}

pub fn put_hash_array(out: &mut Vec<u8>, hashes: &[Hash]) {
    out.extend_from_slice(&(hashes.len() as u32).to_le_bytes());
    for h in hashes {
        put_hash(out, h);
    }
}

pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.bytes.len() < self.pos + len {
            return Err(CodecError::Truncated {
                expected: self.pos + len,
                found: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        let slice = self.take(8)?;
        Ok(u64::from_le_bytes(slice.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    pub fn get_hash(&mut self) -> Result<Hash, CodecError> {
        let slice = self.take(32)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(slice);
        Ok(Hash::from_bytes(buf))
    }

    pub fn get_identity(&mut self) -> Result<Identity, CodecError> {
        let slice = self.take(32)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    pub fn get_signature(&mut self) -> Result<Signature, CodecError> {
        let slice = self.take(64)?;
        let mut buf = [0u8; 64];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    pub fn get_hash_array(&mut self) -> Result<Vec<Hash>, CodecError> {
        let count = self.get_u32()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.get_hash()?);
        }
        Ok(out)
    }

    /// A length-prefixed (u32) block-container byte array, e.g. a nested
    /// serialized `ActionArray` (spec §4.A: "u32 for block containers").
    pub fn get_block(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.get_u32()? as usize;
        self.take(len)
    }

    /// The remainder of the buffer, used for the last variable-length
    /// field in a frame (e.g. a raw action, or `SyncError`'s message).
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

pub fn put_block(out: &mut Vec<u8>, block: &[u8]) {
    out.extend_from_slice(&(block.len() as u32).to_le_bytes());
    out.extend_from_slice(block);
}
