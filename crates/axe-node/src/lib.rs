//! # Axe Node
//!
//! The overlay protocol node (spec §4.F): couples the upstream listener to
//! the chain engine and fans validated output out to resumable
//! subscribers via a cached-connection shim.

mod error;
mod pool;
mod subscriber;
mod tasks;

pub use error::NodeError;
pub use pool::SubscriberPool;
pub use subscriber::CachedConnection;
pub use tasks::{accept_task, fanout_task, listener_task, NewSubscriber};

use std::sync::Arc;

use axe_chain::ChainEngine;
use axe_listener::Signal;
use axe_types::{BoxedConnection, DurableState};
use tokio::sync::mpsc;

const SIGNAL_CHANNEL_CAPACITY: usize = 256;
const FRAME_CHANNEL_CAPACITY: usize = 256;
const TICK_CHANNEL_CAPACITY: usize = 16;
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;
const INCOMING_CHANNEL_CAPACITY: usize = 64;
const COMPLETION_CHANNEL_CAPACITY: usize = 4;

/// Owns the channels wiring listener -> engine -> fan-out, and the
/// subscriber pool. Spawns its three tasks on construction.
pub struct ProtocolNode {
    pub pool: Arc<SubscriberPool>,
    pub signal_tx: mpsc::Sender<Signal>,
    pub incoming_tx: mpsc::Sender<BoxedConnection>,
    pub completion: mpsc::Receiver<NodeError>,
}

impl ProtocolNode {
    pub fn spawn<S: DurableState + 'static>(engine: Arc<ChainEngine<S>>) -> Self {
        let pool = Arc::new(SubscriberPool::new());
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        let (new_sub_tx, new_sub_rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);

        tokio::spawn(tasks::listener_task(
            Arc::clone(&engine),
            signal_rx,
            frame_tx,
            tick_tx,
            completion_tx.clone(),
        ));
        tokio::spawn(tasks::accept_task(incoming_rx, new_sub_tx, completion_tx));
        tokio::spawn(tasks::fanout_task(engine, Arc::clone(&pool), frame_rx, tick_rx, new_sub_rx));

        ProtocolNode {
            pool,
            signal_tx,
            incoming_tx,
            completion: completion_rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_types::{loopback_pair, ActionArray, Hash};

    #[derive(Clone, Default)]
    struct PassAll;

    #[derive(Clone, Default)]
    struct NoopMutations;

    impl axe_types::Mutations for NoopMutations {
        fn merge(&mut self, _other: &Self) {}
    }

    struct AllowAllBlocker;

    impl axe_types::Blocker for AllowAllBlocker {
        type Mutations = NoopMutations;
        fn validate(&mut self, _action: &[u8]) -> bool {
            true
        }
        fn mutations(&self) -> NoopMutations {
            NoopMutations
        }
    }

    impl DurableState for PassAll {
        type Mutations = NoopMutations;
        type Blocker = AllowAllBlocker;
        fn validator(&self, _pending: &[NoopMutations]) -> AllowAllBlocker {
            AllowAllBlocker
        }
        fn incorporate(&mut self, _mutations: &NoopMutations) {}
        fn recover(&mut self) {}
        fn checksum_epoch(&self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn new_block_and_action_reach_a_fresh_subscriber() {
        let engine = Arc::new(ChainEngine::new(PassAll, 0, 16));
        let node = ProtocolNode::spawn(engine);

        let (subscriber_side, node_side) = loopback_pair([9u8; 32], [1u8; 32]);
        node_side.send(axe_codec::Frame::SyncRequest { epoch: 0 }.encode()).await.unwrap();
        node.incoming_tx.send(node_side).await.unwrap();
        // Let the accept/fan-out tasks register the subscriber before the
        // first live frame is broadcast.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        node.signal_tx
            .send(Signal::NewBlock(axe_codec::BlockHeaderFrame {
                epoch: 1,
                checkpoint_epoch: 0,
                checkpoint_hash: Hash::ZERO,
                proposer: [2u8; 32],
            }))
            .await
            .unwrap();
        node.signal_tx.send(Signal::Action(b"hello".to_vec())).await.unwrap();

        let first = subscriber_side.read().await.unwrap();
        assert_eq!(
            axe_codec::Frame::decode(&first).unwrap(),
            axe_codec::Frame::NewBlock(axe_codec::BlockHeaderFrame {
                epoch: 1,
                checkpoint_epoch: 0,
                checkpoint_hash: Hash::ZERO,
                proposer: [2u8; 32],
            })
        );
        let second = subscriber_side.read().await.unwrap();
        let mut expected = ActionArray::new();
        expected.append(b"hello");
        assert_eq!(
            axe_codec::Frame::decode(&second).unwrap(),
            axe_codec::Frame::ActionArray(expected)
        );
        let third = subscriber_side.read().await.unwrap();
        assert_eq!(
            axe_codec::Frame::decode(&third).unwrap(),
            axe_codec::Frame::Action(b"hello".to_vec())
        );
    }
}
