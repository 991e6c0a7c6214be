//! Reads the bulk historical stream off a block provider (spec §4.G, §4.I),
//! grounded on `topos/blockstore.go: ReceiveBlocks` — the subscriber side of
//! the two-step handshake implemented by `axe_provider::transmit_blocks`.

use axe_provider::{parse_block, PersistedBlock, END_OF_TRANSMISSION};
use axe_types::BoxedConnection;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::SyncError;

const HISTORICAL_CHANNEL_CAPACITY: usize = 64;

/// Performs the handshake and spawns a task streaming parsed historical
/// blocks until the end-of-transmission terminator, signaled by a final
/// `None` on the channel. Returns the provider's last-available epoch.
pub async fn receive_blocks(
    conn: &BoxedConnection,
    from_epoch: u64,
) -> Result<(mpsc::Receiver<Option<PersistedBlock>>, u64), SyncError> {
    let last_bytes = conn
        .read()
        .await
        .map_err(|err| SyncError::Historical(err.to_string()))?;
    if last_bytes.len() != 8 {
        return Err(SyncError::Historical("malformed last-epoch handshake".into()));
    }
    let last = u64::from_le_bytes(last_bytes.try_into().unwrap());

    conn.send(from_epoch.to_le_bytes().to_vec())
        .await
        .map_err(|err| SyncError::Historical(err.to_string()))?;

    let (tx, rx) = mpsc::channel(HISTORICAL_CHANNEL_CAPACITY);
    let conn = conn.clone();
    tokio::spawn(async move {
        loop {
            let frame = match conn.read().await {
                Ok(bytes) => bytes,
                Err(_) => {
                    let _ = tx.send(None).await;
                    return;
                }
            };
            if frame == END_OF_TRANSMISSION {
                let _ = tx.send(None).await;
                return;
            }
            if !forward_batch(&frame, &tx).await {
                return;
            }
        }
    });
    Ok((rx, last))
}

/// Parses one `count(u64) ‖ (u32 len ‖ body)*` batch and forwards each
/// parsed block. Returns `false` if the receiving end has hung up.
async fn forward_batch(frame: &[u8], tx: &mpsc::Sender<Option<PersistedBlock>>) -> bool {
    if frame.len() < 8 {
        warn!("malformed historical batch frame, dropping");
        return true;
    }
    let count = u64::from_le_bytes(frame[0..8].try_into().unwrap());
    let mut pos = 8;
    for _ in 0..count {
        if frame.len() < pos + 4 {
            warn!("historical batch truncated before length prefix");
            break;
        }
        let len = u32::from_le_bytes(frame[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if frame.len() < pos + len {
            warn!("historical batch truncated before body");
            break;
        }
        let body = &frame[pos..pos + len];
        pos += len;
        match parse_block(body) {
            Ok(block) => {
                if tx.send(Some(block)).await.is_err() {
                    return false;
                }
            }
            Err(err) => warn!(%err, "failed to parse historical block, skipping"),
        }
    }
    true
}
