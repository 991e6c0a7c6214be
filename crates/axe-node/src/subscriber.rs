//! The cached-connection shim (spec §4.F, GLOSSARY "Cached connection").
//!
//! While historical replay (`ChainEngine::sync`) is in flight, the shim
//! passes replayed frames straight through via `send_direct`; any live
//! frame the fan-out task hands it in the meantime is buffered instead of
//! sent. Once the replay driver calls `ready`, the buffer is flushed in
//! order and the shim becomes an ordinary live subscriber.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axe_chain::SyncSink;
use axe_codec::Frame;
use axe_types::BoxedConnection;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound frames queued per subscriber before a dedicated writer task
/// drains them onto the wire. Bounds how much a slow subscriber can fall
/// behind before being dropped (spec §5 "Timeouts/backpressure").
const OUTBOX_CAPACITY: usize = 1024;

pub struct CachedConnection {
    outbox: mpsc::Sender<Vec<u8>>,
    ready: AtomicBool,
    buffer: Mutex<Vec<Vec<u8>>>,
    alive: AtomicBool,
}

impl CachedConnection {
    /// Spawns the writer task that owns `conn` and returns the shim that
    /// feeds it.
    pub fn spawn(conn: BoxedConnection) -> Arc<Self> {
        let (outbox, inbox) = mpsc::channel(OUTBOX_CAPACITY);
        let shim = Arc::new(CachedConnection {
            outbox,
            ready: AtomicBool::new(false),
            buffer: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
        });
        tokio::spawn(write_loop(conn, inbox, Arc::clone(&shim)));
        shim
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Delivers a live broadcast frame (already encoded). Non-blocking: a
    /// subscriber whose outbox is full is marked dead rather than awaited
    /// on (spec §5).
    pub fn broadcast(&self, bytes: Vec<u8>) {
        if !self.ready.load(Ordering::Acquire) {
            self.buffer.lock().push(bytes);
            return;
        }
        if self.outbox.try_send(bytes).is_err() {
            debug!("subscriber outbox full or closed, marking dead");
            self.mark_dead();
        }
    }
}

#[async_trait]
impl SyncSink for CachedConnection {
    async fn send_direct(&self, frame: Frame) {
        if self.outbox.send(frame.encode()).await.is_err() {
            self.mark_dead();
        }
    }

    async fn ready(&self) {
        let buffered = std::mem::take(&mut *self.buffer.lock());
        for bytes in buffered {
            if self.outbox.send(bytes).await.is_err() {
                self.mark_dead();
                break;
            }
        }
        self.ready.store(true, Ordering::Release);
    }
}

async fn write_loop(conn: BoxedConnection, mut inbox: mpsc::Receiver<Vec<u8>>, shim: Arc<CachedConnection>) {
    while let Some(bytes) = inbox.recv().await {
        if conn.send(bytes).await.is_err() {
            shim.mark_dead();
            return;
        }
    }
}
