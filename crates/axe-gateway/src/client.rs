//! Per-client connection handling (spec §4.H), grounded on
//! `topos/gateway.go: WaitForActions`.

use axe_codec::Frame;
use axe_types::{BoxedConnection, Identity};
use tokio::sync::mpsc;
use tracing::warn;

/// A client connection joining or leaving the live set.
pub enum ClientEvent {
    Joined(BoxedConnection),
    Left(Identity),
}

/// Accepts promoted client connections and spawns one reader task per
/// connection.
pub async fn accept_task(
    mut incoming: mpsc::Receiver<BoxedConnection>,
    event_tx: mpsc::Sender<ClientEvent>,
    action_tx: mpsc::Sender<Vec<u8>>,
) {
    while let Some(conn) = incoming.recv().await {
        let event_tx = event_tx.clone();
        let action_tx = action_tx.clone();
        tokio::spawn(wait_for_actions(conn, event_tx, action_tx));
    }
}

/// Reads `ActionSubmit` frames off one client connection until it closes
/// or sends something malformed, forwarding each action's bytes.
async fn wait_for_actions(
    conn: BoxedConnection,
    event_tx: mpsc::Sender<ClientEvent>,
    action_tx: mpsc::Sender<Vec<u8>>,
) {
    let peer = conn.peer();
    if event_tx.send(ClientEvent::Joined(conn.clone())).await.is_err() {
        return;
    }
    loop {
        match conn.read().await {
            Ok(bytes) => match Frame::decode(&bytes) {
                Ok(Frame::ActionSubmit(action)) => {
                    if action_tx.send(action).await.is_err() {
                        break;
                    }
                }
                Ok(other) => {
                    warn!(?other, "expected ActionSubmit from client, got something else");
                    conn.shutdown().await;
                    break;
                }
                Err(err) => {
                    warn!(%err, "malformed client frame");
                    conn.shutdown().await;
                    break;
                }
            },
            Err(_) => {
                conn.shutdown().await;
                break;
            }
        }
    }
    let _ = event_tx.send(ClientEvent::Left(peer)).await;
}
