//! The node's three cooperating tasks (spec §4.F).

use std::sync::Arc;

use axe_chain::ChainEngine;
use axe_codec::{CommitFrame, Frame, SealFrame};
use axe_listener::Signal;
use axe_types::{BlockHeader, BoxedConnection, DurableState};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::NodeError;
use crate::pool::SubscriberPool;
use crate::subscriber::CachedConnection;

/// A freshly-accepted connection, already past its `SyncRequest` handshake.
pub struct NewSubscriber {
    pub conn: BoxedConnection,
    pub from_epoch: u64,
}

/// Drives the engine from upstream signals; emits the corresponding
/// downstream frame on every state-changing success, plus a tick on each
/// new-block boundary to drive subscriber pruning (spec §4.F, §9).
pub async fn listener_task<S: DurableState>(
    engine: Arc<ChainEngine<S>>,
    mut signals: mpsc::Receiver<Signal>,
    frame_tx: mpsc::Sender<Frame>,
    tick_tx: mpsc::Sender<()>,
    completion: mpsc::Sender<NodeError>,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            Signal::NewBlock(h) => {
                let header = BlockHeader {
                    epoch: h.epoch,
                    checkpoint_epoch: h.checkpoint_epoch,
                    checkpoint_hash: h.checkpoint_hash,
                    proposer: h.proposer,
                };
                match engine.new_block(header) {
                    Ok(_) => {
                        let _ = tick_tx.send(()).await;
                        let _ = frame_tx.send(Frame::NewBlock(h)).await;
                    }
                    Err(err) => warn!(%err, epoch = h.epoch, "new_block rejected"),
                }
            }
            Signal::Action(bytes) => {
                if engine.append(&bytes) {
                    let _ = frame_tx.send(Frame::Action(bytes)).await;
                }
            }
            Signal::ActionArray(arr) => {
                let mut accepted = false;
                for action in arr.iter() {
                    if engine.append(action) {
                        accepted = true;
                    }
                }
                if accepted {
                    let _ = frame_tx.send(Frame::ActionArray(arr)).await;
                }
            }
            Signal::Seal(seal) => handle_seal(&engine, seal, &frame_tx).await,
            Signal::Commit(commit) => handle_commit(&engine, commit, &frame_tx).await,
            Signal::Err(message) => {
                let _ = completion.send(NodeError::Upstream(message)).await;
                return;
            }
        }
    }
}

async fn handle_seal<S: DurableState>(
    engine: &ChainEngine<S>,
    seal: SealFrame,
    frame_tx: &mpsc::Sender<Frame>,
) {
    // close_block is a no-op transition we may have already made for this
    // epoch; a WrongStatus here just means it was already Done.
    let _ = engine.close_block(seal.epoch);
    match engine.seal_block(seal.epoch) {
        Ok(hash) if hash == seal.hash => {
            let _ = frame_tx.send(Frame::SealBlock(seal)).await;
        }
        Ok(hash) => warn!(epoch = seal.epoch, ?hash, upstream = ?seal.hash, "seal hash mismatch"),
        Err(err) => warn!(%err, epoch = seal.epoch, "seal_block failed"),
    }
}

async fn handle_commit<S: DurableState>(
    engine: &ChainEngine<S>,
    commit: CommitFrame,
    frame_tx: &mpsc::Sender<Frame>,
) {
    match engine.commit_block(commit.epoch, commit.invalidated.clone()) {
        Ok(_) => {
            if let Err(err) = engine.incorporate(commit.epoch) {
                warn!(%err, epoch = commit.epoch, "incorporate failed after commit");
            }
            let _ = frame_tx.send(Frame::CommitBlock(commit)).await;
        }
        Err(err) => warn!(%err, epoch = commit.epoch, "commit_block failed"),
    }
}

/// Reads a `SyncRequest` off each newly-promoted connection and forwards
/// it as a subscription request.
pub async fn accept_task(
    mut incoming: mpsc::Receiver<BoxedConnection>,
    new_sub_tx: mpsc::Sender<NewSubscriber>,
    completion: mpsc::Sender<NodeError>,
) {
    while let Some(conn) = incoming.recv().await {
        let bytes = match conn.read().await {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = completion.send(NodeError::Accept(err.to_string())).await;
                continue;
            }
        };
        match Frame::decode(&bytes) {
            Ok(Frame::SyncRequest { epoch }) => {
                if new_sub_tx
                    .send(NewSubscriber { conn, from_epoch: epoch })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(other) => warn!(?other, "expected SyncRequest, got something else"),
            Err(err) => warn!(%err, "malformed handshake frame"),
        }
    }
}

/// Selects over forwarded frames, new-block ticks, and new subscribers;
/// broadcasts frames, prunes dead subscribers on tick, and replays history
/// to new subscribers off the hot path (spec §4.F).
pub async fn fanout_task<S: DurableState + 'static>(
    engine: Arc<ChainEngine<S>>,
    pool: Arc<SubscriberPool>,
    mut frame_rx: mpsc::Receiver<Frame>,
    mut tick_rx: mpsc::Receiver<()>,
    mut new_sub_rx: mpsc::Receiver<NewSubscriber>,
) {
    loop {
        tokio::select! {
            frame = frame_rx.recv() => match frame {
                Some(frame) => pool.broadcast(&frame),
                None => break,
            },
            tick = tick_rx.recv() => match tick {
                Some(()) => pool.prune(),
                None => break,
            },
            subscriber = new_sub_rx.recv() => match subscriber {
                Some(NewSubscriber { conn, from_epoch }) => {
                    let shim = CachedConnection::spawn(conn);
                    pool.add(Arc::clone(&shim));
                    let engine = Arc::clone(&engine);
                    tokio::spawn(async move {
                        engine.sync(&*shim, from_epoch).await;
                        debug!(from_epoch, "subscriber caught up to live feed");
                    });
                }
                None => break,
            },
        }
    }
}
