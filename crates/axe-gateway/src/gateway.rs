//! The gateway's single coordinating task (spec §4.H), grounded on
//! `topos/gateway.go: NewGateway`'s select loop.

use std::collections::HashMap;
use std::sync::Arc;

use axe_codec::Frame;
use axe_telemetry::{GATEWAY_ACTIONS_FORWARDED, GATEWAY_SHUTDOWNS};
use axe_types::{BoxedConnection, Identity};
use tokio::sync::mpsc;
use tracing::warn;

use crate::client::{self, ClientEvent};
use crate::dresser::DresserFn;

const ACTION_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const COMPLETION_CHANNEL_CAPACITY: usize = 1;

/// What the completion channel delivers: a clean shutdown, or the reason
/// the gateway gave up.
#[derive(Debug)]
pub enum GatewayOutcome {
    /// The zero-length-action shutdown signal was seen and every client
    /// connection has since closed (spec §4.H).
    ShutdownComplete,
}

/// Spawns the gateway: one accept task turning each promoted client
/// connection into a reader, and one coordinating task that multiplexes
/// submitted actions onto `upstream`, applying `dresser` if given.
pub fn spawn(
    upstream: BoxedConnection,
    incoming: mpsc::Receiver<BoxedConnection>,
    dresser: Option<Arc<DresserFn>>,
) -> mpsc::Receiver<GatewayOutcome> {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (action_tx, action_rx) = mpsc::channel(ACTION_CHANNEL_CAPACITY);
    let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);

    tokio::spawn(client::accept_task(incoming, event_tx, action_tx));
    tokio::spawn(coordinate(upstream, event_rx, action_rx, dresser, completion_tx));

    completion_rx
}

async fn coordinate(
    upstream: BoxedConnection,
    mut event_rx: mpsc::Receiver<ClientEvent>,
    mut action_rx: mpsc::Receiver<Vec<u8>>,
    dresser: Option<Arc<DresserFn>>,
    completion: mpsc::Sender<GatewayOutcome>,
) {
    let mut live: HashMap<Identity, BoxedConnection> = HashMap::new();
    let mut shutdown = false;

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(ClientEvent::Joined(conn)) => {
                        live.insert(conn.peer(), conn);
                    }
                    Some(ClientEvent::Left(peer)) => {
                        live.remove(&peer);
                    }
                    None => break,
                }
                if shutdown && live.is_empty() {
                    GATEWAY_SHUTDOWNS.inc();
                    let _ = completion.send(GatewayOutcome::ShutdownComplete).await;
                    return;
                }
            }
            action = action_rx.recv() => {
                let Some(action) = action else { break };
                if action.is_empty() {
                    shutdown = true;
                    for conn in live.values() {
                        conn.shutdown().await;
                    }
                    if live.is_empty() {
                        GATEWAY_SHUTDOWNS.inc();
                        let _ = completion.send(GatewayOutcome::ShutdownComplete).await;
                        return;
                    }
                }
                let dressed = match &dresser {
                    Some(f) => f(action),
                    None => action,
                };
                let frame = Frame::ActionSubmit(dressed).encode();
                if let Err(err) = upstream.send(frame).await {
                    warn!(%err, "could not forward action to upstream");
                } else {
                    GATEWAY_ACTIONS_FORWARDED.inc();
                }
            }
        }
    }
}
