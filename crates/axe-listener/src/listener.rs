//! The upstream listener loop (spec §4.E).

use axe_codec::Frame;
use axe_types::{BoxedConnection, PortError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::signal::Signal;

/// Opens a sync request at `from_epoch` on `conn` and forwards demultiplexed
/// signals to `out` until the connection errs or `out` is dropped.
///
/// One upstream frame may expand into several signals (`BlockSealed` and
/// `BlockCommitted` are reconstructed whole-block snapshots, not individual
/// wire events) — see the table in spec §4.E. Order within an expansion and
/// across frames is preserved because the channel is the sole point of
/// handoff to the consumer.
pub async fn run(conn: BoxedConnection, from_epoch: u64, out: mpsc::Sender<Signal>) {
    if let Err(err) = conn.send(Frame::SyncRequest { epoch: from_epoch }.encode()).await {
        let _ = out.send(Signal::Err(format!("sync request failed: {err}"))).await;
        return;
    }

    loop {
        let bytes = match conn.read().await {
            Ok(bytes) => bytes,
            Err(PortError::Closed) => {
                debug!("upstream connection closed");
                let _ = out.send(Signal::Err("upstream closed".to_string())).await;
                return;
            }
            Err(err) => {
                let _ = out.send(Signal::Err(format!("upstream read failed: {err}"))).await;
                return;
            }
        };

        let frame = match Frame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "malformed upstream frame, skipping");
                continue;
            }
        };

        for signal in signals_for(frame) {
            if out.send(signal).await.is_err() {
                return;
            }
        }
    }
}

fn signals_for(frame: Frame) -> Vec<Signal> {
    match frame {
        Frame::NewBlock(h) => vec![Signal::NewBlock(h)],
        Frame::Action(a) => vec![Signal::Action(a)],
        Frame::ActionArray(arr) => vec![Signal::ActionArray(arr)],
        Frame::SealBlock(s) => vec![Signal::Seal(s)],
        Frame::CommitBlock(c) => vec![Signal::Commit(c)],
        Frame::BlockSealed(b) => vec![
            Signal::NewBlock(b.header),
            Signal::ActionArray(b.actions),
            Signal::Seal(b.seal),
        ],
        Frame::BlockCommitted(b) => vec![
            Signal::NewBlock(b.header),
            Signal::ActionArray(b.actions),
            Signal::Seal(b.seal),
            Signal::Commit(b.commit),
        ],
        // ActionSubmit/SyncRequest/SyncError are not part of the upstream
        // derived-protocol feed this listener demultiplexes.
        Frame::ActionSubmit(_) | Frame::SyncRequest { .. } => Vec::new(),
        Frame::SyncError(message) => vec![Signal::Err(message)],
    }
}
