//! A file-backed `ByteStore`, the production adapter for
//! `axe_types::ByteStore` — `axe_types` itself only ships the in-memory
//! reference adapter (its own doc comment: "out of scope for this layer
//! beyond the narrow interfaces"), the same split `net.rs` draws for
//! `SignedConnection`. Grounded on
//! `qc-02-block-storage::adapters::storage::file::FileBackedKVStore`'s
//! plain-`std::fs` approach, simplified to the append/read-at shape
//! `ByteStore` actually needs rather than that store's whole-file
//! rewrite-per-write scheme.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use axe_provider::BlockLogError;
use axe_types::ByteStore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not open block store file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct FileByteStore {
    file: File,
    size: u64,
}

impl FileByteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let size = file
            .metadata()
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        Ok(FileByteStore { file, size })
    }
}

impl ByteStore for FileByteStore {
    fn size(&self) -> u64 {
        self.size
    }

    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    fn read_at(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn file_name(file_id: u32) -> String {
    format!("block-{file_id:06}.log")
}

fn parse_file_id(name: &str) -> Option<u32> {
    name.strip_prefix("block-")?.strip_suffix(".log")?.parse().ok()
}

/// Names each rolled-over log file `block-{file_id:06}.log` under
/// `data_dir` (spec §6 "a new file starts when the current exceeds the
/// cap").
pub fn file_store_factory(data_dir: PathBuf) -> impl FnMut(u32) -> Result<FileByteStore, BlockLogError> + Send + 'static {
    move |file_id: u32| {
        FileByteStore::open(data_dir.join(file_name(file_id)))
            .map_err(|err| BlockLogError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
    }
}

/// Opens every `block-NNNNNN.log` file already present under `data_dir`,
/// in file-id order, or just `block-000000.log` if the directory is
/// empty/new — the set [`axe_provider::BlockLog::open_multi`] resumes
/// from after a restart.
pub fn open_existing_or_initial(data_dir: &Path) -> Result<Vec<FileByteStore>, StoreError> {
    std::fs::create_dir_all(data_dir).map_err(|source| StoreError::Open {
        path: data_dir.to_path_buf(),
        source,
    })?;
    let mut file_ids: Vec<u32> = std::fs::read_dir(data_dir)
        .map_err(|source| StoreError::Open {
            path: data_dir.to_path_buf(),
            source,
        })?
        .flatten()
        .filter_map(|entry| parse_file_id(entry.file_name().to_str()?))
        .collect();
    if file_ids.is_empty() {
        file_ids.push(0);
    }
    file_ids.sort_unstable();
    file_ids
        .into_iter()
        .map(|id| FileByteStore::open(data_dir.join(file_name(id))))
        .collect()
}
