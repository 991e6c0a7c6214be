//! A minimal TCP adapter for `axe_types::SignedConnection`, grounded on the
//! ports-and-adapters split `qc-01-peer-discovery::adapters::network` uses
//! (a production adapter alongside the library's own reference/test one).
//!
//! Real peer authentication and on-wire signing are external collaborators
//! out of scope of this workspace (spec §1) — connecting parties just
//! exchange their claimed 32-byte identity up front, mirroring
//! `axe_types::accept_all_connections`'s "accept every identity" stance.
//! Each message is framed with a u32 length prefix.

use std::sync::Arc;

use async_trait::async_trait;
use axe_types::{BoxedConnection, Identity, PortError, SignedConnection};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("handshake failed: {0}")]
    Handshake(std::io::Error),
}

struct TcpConnection {
    peer: Identity,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

#[async_trait]
impl SignedConnection for TcpConnection {
    async fn send(&self, bytes: Vec<u8>) -> Result<(), PortError> {
        let mut writer = self.writer.lock().await;
        let len = bytes.len() as u32;
        writer
            .write_all(&len.to_le_bytes())
            .await
            .map_err(|err| PortError::Transport(err.to_string()))?;
        writer
            .write_all(&bytes)
            .await
            .map_err(|err| PortError::Transport(err.to_string()))
    }

    async fn read(&self) -> Result<Vec<u8>, PortError> {
        let mut reader = self.reader.lock().await;
        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes).await.map_err(|_| PortError::Closed)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await.map_err(|_| PortError::Closed)?;
        Ok(body)
    }

    async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    fn peer(&self) -> Identity {
        self.peer
    }
}

async fn handshake(stream: TcpStream, self_identity: Identity) -> Result<BoxedConnection, NetError> {
    stream.set_nodelay(true).ok();
    let (mut read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(&self_identity)
        .await
        .map_err(NetError::Handshake)?;
    let mut peer = [0u8; 32];
    read_half.read_exact(&mut peer).await.map_err(NetError::Handshake)?;
    Ok(Arc::new(TcpConnection {
        peer,
        reader: Mutex::new(read_half),
        writer: Mutex::new(write_half),
    }))
}

/// Dials `addr` and performs the identity handshake.
pub async fn connect(addr: &str, self_identity: Identity) -> Result<BoxedConnection, NetError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| NetError::Connect { addr: addr.to_string(), source })?;
    handshake(stream, self_identity).await
}

/// Binds `addr` and forwards every successfully-handshaken connection to
/// `tx`, one task per peer. Runs until `tx` is dropped or the listener
/// itself fails.
pub async fn accept_loop(
    addr: &str,
    self_identity: Identity,
    tx: mpsc::Sender<BoxedConnection>,
) -> Result<(), NetError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| NetError::Bind { addr: addr.to_string(), source })?;
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "tcp accept failed");
                continue;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            match handshake(stream, self_identity).await {
                Ok(conn) => {
                    let _ = tx.send(conn).await;
                }
                Err(err) => warn!(%err, "inbound handshake failed"),
            }
        });
    }
}
