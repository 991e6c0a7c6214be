//! The live-subscriber pool (spec §4.F "fan-out task", §5 "connection pool
//! is mutated only by the fan-out task").

use std::sync::Arc;

use axe_codec::Frame;
use axe_telemetry::{SUBSCRIBERS_CONNECTED, SUBSCRIBERS_PRUNED};
use parking_lot::Mutex;
use tracing::debug;

use crate::subscriber::CachedConnection;

#[derive(Default)]
pub struct SubscriberPool {
    subscribers: Mutex<Vec<Arc<CachedConnection>>>,
}

impl SubscriberPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscriber: Arc<CachedConnection>) {
        self.subscribers.lock().push(subscriber);
        SUBSCRIBERS_CONNECTED.inc();
    }

    /// Broadcasts one frame to every currently-registered subscriber.
    /// Encoded once and cloned per subscriber, never awaited.
    pub fn broadcast(&self, frame: &Frame) {
        let bytes = frame.encode();
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            subscriber.broadcast(bytes.clone());
        }
    }

    /// Drops subscribers marked dead since the last prune. Called only at
    /// new-block boundaries (spec §9 "Connection pool prune policy").
    pub fn prune(&self) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.is_alive());
        let pruned = before - subscribers.len();
        if pruned > 0 {
            SUBSCRIBERS_CONNECTED.sub(pruned as f64);
            SUBSCRIBERS_PRUNED.inc_by(pruned as f64);
            debug!(pruned, remaining = subscribers.len(), "pruned dead subscribers");
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }
}
