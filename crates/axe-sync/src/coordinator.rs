//! Drives the join-a-running-network sequence (spec §4.I), grounded on
//! `topos/sync.go: SyncSocial`.
//!
//! Per spec.md §9 (the distilled, authoritative text): the coordinator
//! surfaces "provider interrupted" when the *live* stream ends before the
//! *historical* stream has finished — the literal source's condition reads
//! inverted from this and is not reproduced here.

use std::sync::Arc;

use axe_provider::PersistedBlock;
use axe_types::BoxedConnection;
use tokio::sync::mpsc;

use crate::block::SyncBlock;
use crate::error::SyncError;
use crate::historical;
use crate::live::LiveAssembler;
use axe_chain::{BlockSorter, SorterEvent};

const COMPLETION_CHANNEL_CAPACITY: usize = 1;
const SIGNAL_CHANNEL_CAPACITY: usize = 256;

/// The downstream consumer of reordered blocks (spec §4.I step 3),
/// grounded on `topos/sync.go: Chainer`.
pub trait BlockSink: Send + Sync {
    fn epoch(&self) -> u64;
    fn add_block(&self, block: PersistedBlock);
}

/// Joins a running derived-protocol network: opens a historical stream from
/// `provider_conn` starting just after `sink`'s current epoch, opens a live
/// stream from `node_conn` starting at the historical stream's
/// last-available epoch, and feeds both through a block sorter into `sink`.
pub fn spawn<Sink: BlockSink + 'static>(
    provider_conn: BoxedConnection,
    node_conn: BoxedConnection,
    sink: Arc<Sink>,
) -> mpsc::Receiver<SyncError> {
    let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let start_epoch = sink.epoch();
        let (mut old_rx, last) = match historical::receive_blocks(&provider_conn, start_epoch + 1).await {
            Ok(pair) => pair,
            Err(err) => {
                let _ = completion_tx.send(err).await;
                return;
            }
        };

        let (signal_tx, mut signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        tokio::spawn(axe_listener::run(node_conn, last, signal_tx));

        let mut sorter = BlockSorter::new(start_epoch);
        let mut assembler = LiveAssembler::new();
        let mut historical_done = false;
        let mut live_done = false;

        loop {
            tokio::select! {
                old = old_rx.recv(), if !historical_done => {
                    match old {
                        Some(Some(block)) => emit(&mut sorter, &*sink, block),
                        Some(None) | None => {
                            historical_done = true;
                            if live_done {
                                return;
                            }
                        }
                    }
                }
                sig = signal_rx.recv(), if !live_done => {
                    match sig {
                        Some(axe_listener::Signal::Err(_)) | None => {
                            live_done = true;
                            if !historical_done {
                                let _ = completion_tx.send(SyncError::ProviderInterrupted).await;
                                return;
                            }
                        }
                        Some(signal) => {
                            if let Some(block) = assembler.feed(signal) {
                                emit(&mut sorter, &*sink, block);
                            }
                        }
                    }
                }
            }
        }
    });

    completion_rx
}

fn emit<Sink: BlockSink>(sorter: &mut BlockSorter<SyncBlock>, sink: &Sink, block: PersistedBlock) {
    if let SorterEvent::Emit(items) = sorter.push(Some(SyncBlock(block))) {
        for item in items {
            sink.add_block(item.0);
        }
    }
}
