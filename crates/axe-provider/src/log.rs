//! Append-only persisted block log (spec §3, §4.G, §6): `u32 length ‖ body`
//! records, split across size-capped files — a new file starts once the
//! current one would exceed the configured cap — with an epoch ->
//! (file-id, offset) index reconstructable by scanning every file in
//! order.

use std::collections::BTreeMap;

use axe_types::ByteStore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockLogError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("epoch {0} not found in index")]
    NotFound(u64),
    #[error("log record truncated at offset {offset}")]
    Truncated { offset: u64 },
}

/// `epoch -> (file-id, offset)` index.
#[derive(Default)]
pub struct BlockIndex {
    entries: BTreeMap<u64, (u32, u64)>,
}

impl BlockIndex {
    /// Scans every store front to back, in file-id order, parsing
    /// `u32 length ‖ body` records and recovering each record's epoch from
    /// the first 8 bytes of `body` (spec §6 "index reconstructable by
    /// scanning").
    pub fn reconstruct<S: ByteStore>(stores: &[S]) -> Result<Self, BlockLogError> {
        let mut entries = BTreeMap::new();
        for (file_id, store) in stores.iter().enumerate() {
            let file_id = file_id as u32;
            let mut offset = 0u64;
            let size = store.size();
            while offset < size {
                let header = store.read_at(offset, 4)?;
                if header.len() < 4 {
                    return Err(BlockLogError::Truncated { offset });
                }
                let len = u32::from_le_bytes(header.try_into().unwrap()) as u64;
                let body_offset = offset + 4;
                let body = store.read_at(body_offset, len.min(8))?;
                if body.len() < 8 {
                    return Err(BlockLogError::Truncated { offset: body_offset });
                }
                let epoch = u64::from_le_bytes(body[0..8].try_into().unwrap());
                entries.insert(epoch, (file_id, body_offset));
                offset = body_offset + len;
            }
        }
        Ok(BlockIndex { entries })
    }

    pub fn last_epoch(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    pub fn get(&self, epoch: u64) -> Option<(u32, u64)> {
        self.entries.get(&epoch).copied()
    }

    pub fn insert(&mut self, epoch: u64, file_id: u32, offset: u64) {
        self.entries.insert(epoch, (file_id, offset));
    }
}

/// An append-only block log spanning one or more size-capped
/// [`ByteStore`]s (spec §6: "files are capped at a configurable size; a
/// new file starts when the current exceeds the cap").
pub struct BlockLog<S: ByteStore> {
    stores: Vec<S>,
    index: BlockIndex,
    file_cap: u64,
    next_store: Box<dyn FnMut(u32) -> Result<S, BlockLogError> + Send>,
}

impl<S: ByteStore> BlockLog<S> {
    /// Opens a log backed by `initial`. Once the store currently being
    /// written to would exceed `file_cap` bytes, `next_store(file_id)` is
    /// called to mint the next one and writes continue there. `file_cap ==
    /// 0` disables rollover (a single, unbounded file).
    pub fn open(
        initial: S,
        file_cap: u64,
        next_store: impl FnMut(u32) -> Result<S, BlockLogError> + Send + 'static,
    ) -> Result<Self, BlockLogError> {
        Self::open_multi(vec![initial], file_cap, next_store)
    }

    /// Like [`Self::open`], but resumes from every file already on disk
    /// (e.g. after a restart finds `block-000000.log`, `block-000001.log`,
    /// ... already present) instead of assuming a single fresh store.
    /// `stores` must be ordered by file-id and non-empty.
    pub fn open_multi(
        stores: Vec<S>,
        file_cap: u64,
        next_store: impl FnMut(u32) -> Result<S, BlockLogError> + Send + 'static,
    ) -> Result<Self, BlockLogError> {
        assert!(!stores.is_empty(), "a block log needs at least one store");
        let index = BlockIndex::reconstruct(&stores)?;
        Ok(BlockLog {
            stores,
            index,
            file_cap,
            next_store: Box::new(next_store),
        })
    }

    pub fn last_epoch(&self) -> u64 {
        self.index.last_epoch().unwrap_or(0)
    }

    pub fn append(&mut self, epoch: u64, body: &[u8]) -> Result<(), BlockLogError> {
        let record_len = 4 + body.len() as u64;
        let current_size = self.stores.last().expect("at least one store").size();
        if self.file_cap > 0 && current_size > 0 && current_size + record_len > self.file_cap {
            let file_id = self.stores.len() as u32;
            self.stores.push((self.next_store)(file_id)?);
        }
        let file_id = (self.stores.len() - 1) as u32;
        let store = self.stores.last_mut().expect("at least one store");
        let offset = store.size() + 4;
        store.append(&(body.len() as u32).to_le_bytes())?;
        store.append(body)?;
        self.index.insert(epoch, file_id, offset);
        Ok(())
    }

    pub fn read(&self, epoch: u64) -> Result<Vec<u8>, BlockLogError> {
        let (file_id, offset) = self.index.get(epoch).ok_or(BlockLogError::NotFound(epoch))?;
        let store = self
            .stores
            .get(file_id as usize)
            .ok_or(BlockLogError::NotFound(epoch))?;
        let header = store.read_at(offset - 4, 4)?;
        let len = u32::from_le_bytes(header.try_into().unwrap()) as u64;
        Ok(store.read_at(offset, len)?)
    }

    /// The store currently being appended to.
    pub fn store_ref(&self) -> &S {
        self.stores.last().expect("at least one store")
    }

    pub fn file_count(&self) -> usize {
        self.stores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_types::InMemoryByteStore;

    fn open_uncapped() -> BlockLog<InMemoryByteStore> {
        BlockLog::open(InMemoryByteStore::new(), 0, |_| Ok(InMemoryByteStore::new())).unwrap()
    }

    #[test]
    fn append_then_read_round_trips() {
        let mut log = open_uncapped();
        log.append(1, b"block-one").unwrap();
        log.append(2, b"block-two").unwrap();
        assert_eq!(log.read(1).unwrap(), b"block-one");
        assert_eq!(log.read(2).unwrap(), b"block-two");
        assert_eq!(log.last_epoch(), 2);
    }

    #[test]
    fn index_reconstructs_by_scan() {
        let mut log = open_uncapped();
        log.append(5, b"epoch-five-body").unwrap();
        let index = BlockIndex::reconstruct(&log.stores).unwrap();
        assert_eq!(index.last_epoch(), Some(5));
    }

    #[test]
    fn rollover_starts_a_new_file_once_cap_exceeded() {
        // Each record here is 4-byte length prefix + 9-byte body = 13
        // bytes; cap at 20 so the second record does not fit alongside the
        // first.
        let mut log = BlockLog::open(InMemoryByteStore::new(), 20, |_| Ok(InMemoryByteStore::new())).unwrap();
        log.append(1, b"block-one").unwrap();
        assert_eq!(log.file_count(), 1);
        log.append(2, b"block-two").unwrap();
        assert_eq!(log.file_count(), 2);
        assert_eq!(log.read(1).unwrap(), b"block-one");
        assert_eq!(log.read(2).unwrap(), b"block-two");
    }

    #[test]
    fn zero_cap_never_rolls_over() {
        let mut log = open_uncapped();
        for epoch in 1..=50u64 {
            log.append(epoch, b"some block body").unwrap();
        }
        assert_eq!(log.file_count(), 1);
    }
}
