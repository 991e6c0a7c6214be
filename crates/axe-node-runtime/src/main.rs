//! Axe node runtime: the composition root wiring the listener, engine,
//! protocol node, block provider, gateway and sync coordinator into one
//! running process (SPEC_FULL §0).
//!
//! Two modes, selected by `AXE_MODE` (spec §4.F/§4.I):
//! - `primary` dials the upstream authority directly and serves both live
//!   subscribers (via the protocol node) and historical replay (via the
//!   block provider), plus a client-action gateway.
//! - `replica` joins an already-running node's provider+node pair through
//!   the sync coordinator and mirrors the derived chain locally.

mod config;
mod health;
mod net;
mod sink;
mod state;
mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use axe_chain::ChainEngine;
use axe_node::ProtocolNode;
use axe_provider::{accept_subscribers, BlockLog, BlockProvider, IncomingSubscriber};
use axe_sync::BlockSink;
use axe_types::{BoxedConnection, Identity};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tracing::{error, info};

use config::{Mode, PrimaryConfig, ReplicaConfig, RuntimeConfig};
use health::Status;
use state::TrustingState;

const CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("loading runtime configuration")?;
    let telemetry_config = axe_telemetry::TelemetryConfig::from_env();
    let _telemetry = axe_telemetry::init_telemetry(&telemetry_config).context("initializing telemetry")?;

    info!(mode = ?config.mode, "axe node runtime starting");

    match config.mode {
        Mode::Primary(ref primary) => run_primary(&config, primary).await,
        Mode::Replica(ref replica) => run_replica(&config, replica).await,
    }
}

async fn run_primary(config: &RuntimeConfig, primary: &PrimaryConfig) -> Result<()> {
    let identity = config.self_identity;

    let engine = Arc::new(ChainEngine::new(TrustingState::default(), 0, config.keep_n_blocks));
    let mut node = ProtocolNode::spawn(Arc::clone(&engine));

    let upstream_conn = net::connect(&primary.upstream_addr, identity)
        .await
        .context("connecting to upstream authority")?;

    let (raw_tx, mut raw_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(axe_listener::run(upstream_conn, engine.live_epoch(), raw_tx));

    let provider_dir = config.data_dir.join("provider");
    let provider_stores =
        store::open_existing_or_initial(&provider_dir).context("opening block provider's log files")?;
    let provider = Arc::new(SyncMutex::new(
        BlockProvider::new_multi(
            provider_stores,
            identity,
            config.byte_store_file_cap,
            store::file_store_factory(provider_dir),
        )
        .context("opening block provider log")?,
    ));

    let (provider_signal_tx, mut provider_signal_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let node_signal_tx = node.signal_tx.clone();
    tokio::spawn(async move {
        while let Some(signal) = raw_rx.recv().await {
            if node_signal_tx.send(signal.clone()).await.is_err() {
                break;
            }
            if provider_signal_tx.send(signal).await.is_err() {
                break;
            }
        }
    });

    let driving_provider = Arc::clone(&provider);
    tokio::spawn(async move {
        while let Some(signal) = provider_signal_rx.recv().await {
            // Signing is an external collaborator (spec §1); the
            // provider's persisted blocks carry a placeholder signature
            // here, the same stance `ChainEngine::sync`'s zero-filled
            // replay frames take.
            driving_provider.lock().apply(signal, |_hash| [0u8; 64]);
        }
    });

    let (incoming_sub_tx, incoming_sub_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(accept_subscribers(incoming_sub_rx, Arc::clone(&provider)));
    spawn_provider_accept_loop(primary.provider_listen_addr.clone(), identity, incoming_sub_tx);

    spawn_node_accept_loop(primary.subscriber_listen_addr.clone(), identity, node.incoming_tx.clone());

    let gateway_upstream_conn = net::connect(&primary.upstream_addr, identity)
        .await
        .context("connecting gateway's upstream link")?;
    let (gateway_incoming_tx, gateway_incoming_rx) = mpsc::channel(CHANNEL_CAPACITY);
    spawn_raw_accept_loop(primary.gateway_listen_addr.clone(), identity, gateway_incoming_tx);
    let mut gateway_completion = axe_gateway::spawn(gateway_upstream_conn, gateway_incoming_rx, None);

    let status_engine = Arc::clone(&engine);
    let status_fn: Arc<health::StatusFn> = Arc::new(move || Status {
        live_epoch: status_engine.live_epoch(),
        state_epoch: status_engine.state_epoch(),
        last_commit_epoch: status_engine.last_commit_epoch(),
    });
    let health_addr = config.health_listen_addr.clone();
    tokio::spawn(async move {
        if let Err(err) = health::serve(&health_addr, status_fn).await {
            error!(%err, "health surface exited");
        }
    });

    tokio::select! {
        Some(err) = node.completion.recv() => {
            error!(%err, "protocol node reported a fatal error");
        }
        Some(outcome) = gateway_completion.recv() => {
            info!(?outcome, "gateway completed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    Ok(())
}

async fn run_replica(config: &RuntimeConfig, replica: &ReplicaConfig) -> Result<()> {
    let identity = config.self_identity;

    let provider_conn = net::connect(&replica.provider_addr, identity)
        .await
        .context("connecting to peer block provider")?;
    let node_conn = net::connect(&replica.node_addr, identity)
        .await
        .context("connecting to peer protocol node")?;

    let replica_dir = config.data_dir.join("replica");
    let replica_stores =
        store::open_existing_or_initial(&replica_dir).context("opening replica's log files")?;
    let log = BlockLog::open_multi(
        replica_stores,
        config.byte_store_file_cap,
        store::file_store_factory(replica_dir),
    )
    .context("opening replica log")?;
    let sink = Arc::new(sink::LogSink::new(log));

    let mut completion = axe_sync::spawn(provider_conn, node_conn, Arc::clone(&sink));

    let status_sink = Arc::clone(&sink);
    let status_fn: Arc<health::StatusFn> = Arc::new(move || {
        let epoch = status_sink.epoch();
        Status {
            live_epoch: epoch,
            state_epoch: epoch,
            last_commit_epoch: epoch,
        }
    });
    let health_addr = config.health_listen_addr.clone();
    tokio::spawn(async move {
        if let Err(err) = health::serve(&health_addr, status_fn).await {
            error!(%err, "health surface exited");
        }
    });

    tokio::select! {
        Some(err) = completion.recv() => {
            error!(%err, "sync coordinator reported a fatal error");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    Ok(())
}

fn spawn_node_accept_loop(addr: String, identity: Identity, tx: mpsc::Sender<BoxedConnection>) {
    tokio::spawn(async move {
        if let Err(err) = net::accept_loop(&addr, identity, tx).await {
            error!(%err, "node subscriber accept loop failed");
        }
    });
}

fn spawn_raw_accept_loop(addr: String, identity: Identity, tx: mpsc::Sender<BoxedConnection>) {
    tokio::spawn(async move {
        if let Err(err) = net::accept_loop(&addr, identity, tx).await {
            error!(%err, "gateway client accept loop failed");
        }
    });
}

fn spawn_provider_accept_loop(addr: String, identity: Identity, tx: mpsc::Sender<IncomingSubscriber>) {
    let (inner_tx, mut inner_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(async move {
        while let Some(conn) = inner_rx.recv().await {
            if tx.send(IncomingSubscriber(conn)).await.is_err() {
                return;
            }
        }
    });
    tokio::spawn(async move {
        if let Err(err) = net::accept_loop(&addr, identity, inner_tx).await {
            error!(%err, "provider accept loop failed");
        }
    });
}
