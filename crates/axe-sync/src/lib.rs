//! # Axe Sync
//!
//! Joins a running derived-protocol network (spec §4.I): bridges a
//! historical catch-up stream from a block provider and a live-tail stream
//! from a protocol node through the block sorter, delivering strictly
//! ordered blocks to a downstream chainer.

mod block;
mod coordinator;
mod error;
mod historical;
mod live;

pub use block::SyncBlock;
pub use coordinator::{spawn, BlockSink};
pub use error::SyncError;
pub use live::LiveAssembler;

#[cfg(test)]
mod tests {
    use super::*;
    use axe_codec::{BlockHeaderFrame, CommitFrame, Frame, SealFrame};
    use axe_provider::{PersistedBlock, END_OF_TRANSMISSION};
    use axe_types::{loopback_pair, Hash};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::{sleep, timeout, Duration};

    struct RecordingSink {
        seen: Mutex<Vec<u64>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink { seen: Mutex::new(Vec::new()) }
        }
    }

    impl BlockSink for RecordingSink {
        fn epoch(&self) -> u64 {
            0
        }

        fn add_block(&self, block: PersistedBlock) {
            self.seen.lock().push(block.epoch);
        }
    }

    async fn serve_empty_historical(provider_side: axe_types::BoxedConnection) {
        provider_side.send(0u64.to_le_bytes().to_vec()).await.unwrap();
        let start = provider_side.read().await.unwrap();
        assert_eq!(u64::from_le_bytes(start.try_into().unwrap()), 1);
        provider_side
            .send(END_OF_TRANSMISSION.to_vec())
            .await
            .unwrap();
    }

    /// Historical stream is immediately empty; live blocks 1 and 2 arrive
    /// out of order and are delivered to the sink in epoch order.
    #[tokio::test]
    async fn live_only_blocks_arrive_in_order() {
        let (provider_gateway_side, provider_remote_side) = loopback_pair([9u8; 32], [1u8; 32]);
        let (node_gateway_side, node_remote_side) = loopback_pair([8u8; 32], [2u8; 32]);

        let sink = Arc::new(RecordingSink::new());
        let mut completion = spawn(provider_gateway_side, node_gateway_side, Arc::clone(&sink));

        tokio::spawn(serve_empty_historical(provider_remote_side));

        // live side performs the listener's own SyncRequest handshake first
        let handshake = node_remote_side.read().await.unwrap();
        assert_eq!(Frame::decode(&handshake).unwrap(), Frame::SyncRequest { epoch: 0 });

        send_block(&node_remote_side, 2).await;
        send_block(&node_remote_side, 1).await;

        sleep(Duration::from_millis(30)).await;
        assert_eq!(*sink.seen.lock(), vec![1, 2]);

        drop(node_remote_side);
        // historical already finished cleanly, so the live stream ending
        // afterwards must not be reported as an error.
        assert!(timeout(Duration::from_millis(50), completion.recv()).await.is_err());
    }

    async fn send_block(conn: &axe_types::BoxedConnection, epoch: u64) {
        conn.send(
            Frame::NewBlock(BlockHeaderFrame {
                epoch,
                checkpoint_epoch: 0,
                checkpoint_hash: Hash::ZERO,
                proposer: [0u8; 32],
            })
            .encode(),
        )
        .await
        .unwrap();
        conn.send(Frame::Action(b"a".to_vec()).encode()).await.unwrap();
        conn.send(
            Frame::SealBlock(SealFrame {
                epoch,
                hash: Hash::from_bytes([epoch as u8; 32]),
                signature: [0u8; 64],
            })
            .encode(),
        )
        .await
        .unwrap();
        conn.send(
            Frame::CommitBlock(CommitFrame {
                epoch,
                invalidated: vec![],
                publisher: [0u8; 32],
                signature: [0u8; 64],
            })
            .encode(),
        )
        .await
        .unwrap();
    }
}
