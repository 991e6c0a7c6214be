//! # Axe Gateway
//!
//! Multiplexes client-submitted actions onto a single upstream connection
//! (spec §4.H): accepts client connections, optionally "dresses" each
//! submitted action before forwarding it, and declares quiescence once a
//! zero-length action triggers shutdown and every client has disconnected.

mod client;
mod dresser;
mod error;
mod gateway;

pub use dresser::DresserFn;
pub use error::GatewayError;
pub use gateway::{spawn, GatewayOutcome};

#[cfg(test)]
mod tests {
    use super::*;
    use axe_codec::Frame;
    use axe_types::loopback_pair;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Duration};

    /// Seed scenario 4: one client submits a normal action (forwarded
    /// upstream), another submits a zero-length action (shutdown); once
    /// both connections close, the completion channel reports it.
    #[tokio::test]
    async fn shutdown_completes_once_live_set_empties() {
        let (upstream_gateway_side, upstream_remote_side) = loopback_pair([9u8; 32], [8u8; 32]);
        let (client_a_gateway_side, client_a_remote_side) = loopback_pair([1u8; 32], [1u8; 32]);
        let (client_b_gateway_side, client_b_remote_side) = loopback_pair([2u8; 32], [2u8; 32]);

        let (incoming_tx, incoming_rx) = mpsc::channel(4);
        let mut completion = super::spawn(upstream_gateway_side, incoming_rx, None);

        incoming_tx.send(client_a_gateway_side).await.unwrap();
        incoming_tx.send(client_b_gateway_side).await.unwrap();
        sleep(Duration::from_millis(20)).await;

        client_a_remote_side
            .send(Frame::ActionSubmit(b"hello".to_vec()).encode())
            .await
            .unwrap();
        let forwarded = upstream_remote_side.read().await.unwrap();
        assert_eq!(
            Frame::decode(&forwarded).unwrap(),
            Frame::ActionSubmit(b"hello".to_vec())
        );

        client_b_remote_side
            .send(Frame::ActionSubmit(Vec::new()).encode())
            .await
            .unwrap();
        // the empty action is itself forwarded upstream before shutdown
        // teardown completes.
        let forwarded_empty = upstream_remote_side.read().await.unwrap();
        assert_eq!(Frame::decode(&forwarded_empty).unwrap(), Frame::ActionSubmit(Vec::new()));

        drop(client_a_remote_side);
        drop(client_b_remote_side);

        let outcome = completion.recv().await;
        assert!(matches!(outcome, Some(GatewayOutcome::ShutdownComplete)));
    }

    #[tokio::test]
    async fn dresser_rewrites_action_before_forwarding() {
        let (upstream_gateway_side, upstream_remote_side) = loopback_pair([9u8; 32], [8u8; 32]);
        let (client_gateway_side, client_remote_side) = loopback_pair([1u8; 32], [1u8; 32]);

        let (incoming_tx, incoming_rx) = mpsc::channel(4);
        let dresser: std::sync::Arc<DresserFn> = std::sync::Arc::new(|mut action: Vec<u8>| {
            action.extend_from_slice(b"-dressed");
            action
        });
        let _completion = super::spawn(upstream_gateway_side, incoming_rx, Some(dresser));

        incoming_tx.send(client_gateway_side).await.unwrap();
        sleep(Duration::from_millis(20)).await;

        client_remote_side
            .send(Frame::ActionSubmit(b"raw".to_vec()).encode())
            .await
            .unwrap();
        let forwarded = upstream_remote_side.read().await.unwrap();
        assert_eq!(
            Frame::decode(&forwarded).unwrap(),
            Frame::ActionSubmit(b"raw-dressed".to_vec())
        );
    }
}
