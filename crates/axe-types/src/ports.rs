//! External collaborator ports (spec §6): signed connections and the
//! append-only byte store. Both are out of scope for this layer beyond
//! the narrow interfaces named here; in-memory reference adapters are
//! provided so the rest of the workspace can be exercised without a real
//! transport or disk.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::hash::Identity;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("peer identity rejected")]
    Rejected,
}

/// A single framed-message connection: each `send`/`read` delivers one
/// framed message atomically (spec §6).
#[async_trait]
pub trait SignedConnection: Send + Sync {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), PortError>;
    async fn read(&self) -> Result<Vec<u8>, PortError>;
    async fn shutdown(&self);
    fn peer(&self) -> Identity;
}

pub type BoxedConnection = Arc<dyn SignedConnection>;

/// Predicate deciding whether a promoted peer identity is acceptable.
pub type ConnectionValidator = Arc<dyn Fn(&Identity) -> bool + Send + Sync>;

/// Accepts every peer identity, matching the source's `AcceptAllConnections`.
pub fn accept_all_connections() -> ConnectionValidator {
    Arc::new(|_| true)
}

/// The append-only byte store collaborator (spec §6). Backs the block
/// provider's persisted block log.
pub trait ByteStore: Send + Sync {
    fn size(&self) -> u64;
    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    fn read_at(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>>;
}

/// In-memory `ByteStore` for unit tests and the development binary's
/// ephemeral mode.
#[derive(Default)]
pub struct InMemoryByteStore {
    data: Vec<u8>,
}

impl InMemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for InMemoryByteStore {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn read_at(&self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        let start = offset as usize;
        let end = start + len as usize;
        if end > self.data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read_at past end of store",
            ));
        }
        Ok(self.data[start..end].to_vec())
    }
}

/// Creates an in-process connected pair of [`SignedConnection`]s, for tests
/// and same-process wiring. Each side's `read` observes what the other side
/// `send`s, in order.
pub fn loopback_pair(a: Identity, b: Identity) -> (Arc<Channel>, Arc<Channel>) {
    let (tx_a_to_b, rx_a_to_b) = tokio::sync::mpsc::unbounded_channel();
    let (tx_b_to_a, rx_b_to_a) = tokio::sync::mpsc::unbounded_channel();
    let side_a = Arc::new(Channel {
        peer: b,
        send_tx: tx_a_to_b,
        recv_rx: Mutex::new(rx_b_to_a),
    });
    let side_b = Arc::new(Channel {
        peer: a,
        send_tx: tx_b_to_a,
        recv_rx: Mutex::new(rx_a_to_b),
    });
    (side_a, side_b)
}

pub struct Channel {
    peer: Identity,
    send_tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    recv_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[async_trait]
impl SignedConnection for Channel {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), PortError> {
        self.send_tx.send(bytes).map_err(|_| PortError::Closed)
    }

    async fn read(&self) -> Result<Vec<u8>, PortError> {
        let mut rx = self.recv_rx.lock().await;
        rx.recv().await.ok_or(PortError::Closed)
    }

    async fn shutdown(&self) {
        // Dropping the sender on either side naturally closes the channel;
        // an explicit shutdown is a no-op until both halves are dropped.
    }

    fn peer(&self) -> Identity {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_delivers_in_order() {
        let (a, b) = loopback_pair([1u8; 32], [2u8; 32]);
        a.send(b"one".to_vec()).await.unwrap();
        a.send(b"two".to_vec()).await.unwrap();
        assert_eq!(b.read().await.unwrap(), b"one");
        assert_eq!(b.read().await.unwrap(), b"two");
        assert_eq!(b.peer(), [1u8; 32]);
    }

    #[test]
    fn memory_byte_store_round_trips() {
        let mut store = InMemoryByteStore::new();
        store.append(b"hello").unwrap();
        store.append(b"world").unwrap();
        assert_eq!(store.size(), 10);
        assert_eq!(store.read_at(5, 5).unwrap(), b"world");
    }
}
