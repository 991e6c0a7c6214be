//! # Axe Listener
//!
//! Connects to the upstream authority over a signed connection, issues a
//! `SyncRequest`, and demultiplexes the resulting frame stream into typed
//! [`Signal`]s on a channel (spec §4.E).

mod listener;
mod signal;

pub use listener::run;
pub use signal::Signal;

#[cfg(test)]
mod tests {
    use super::*;
    use axe_codec::Frame;
    use axe_types::loopback_pair;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn demultiplexes_block_committed_into_four_signals() {
        let (upstream, authority) = loopback_pair([1u8; 32], [2u8; 32]);
        let (tx, mut rx) = mpsc::channel(16);

        let listener_task = tokio::spawn(async move {
            run(upstream, 0, tx).await;
        });

        // Drain the listener's opening SyncRequest.
        let request = authority.read().await.unwrap();
        assert_eq!(Frame::decode(&request).unwrap(), Frame::SyncRequest { epoch: 0 });

        let mut actions = axe_types::ActionArray::new();
        actions.append(b"a1");
        let frame = Frame::BlockCommitted(axe_codec::CommittedBlockFrame {
            header: axe_codec::BlockHeaderFrame {
                epoch: 1,
                checkpoint_epoch: 0,
                checkpoint_hash: axe_types::Hash::ZERO,
                proposer: [3u8; 32],
            },
            actions,
            seal: axe_codec::SealFrame {
                epoch: 1,
                hash: axe_types::Hash::ZERO,
                signature: [0u8; 64],
            },
            commit: axe_codec::CommitFrame {
                epoch: 1,
                invalidated: vec![],
                publisher: [4u8; 32],
                signature: [0u8; 64],
            },
        });
        authority.send(frame.encode()).await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), Signal::NewBlock(h) if h.epoch == 1));
        assert!(matches!(rx.recv().await.unwrap(), Signal::ActionArray(_)));
        assert!(matches!(rx.recv().await.unwrap(), Signal::Seal(_)));
        assert!(matches!(rx.recv().await.unwrap(), Signal::Commit(_)));

        drop(authority);
        let tail = rx.recv().await;
        assert!(matches!(tail, Some(Signal::Err(_)) | None));
        listener_task.await.unwrap();
    }
}
