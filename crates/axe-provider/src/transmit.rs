//! Subscriber handshake and bulk block transmission (spec §4.G, seed tests
//! 5 and 6), grounded on the source's `TransmitBlocks`/`ReceiveBlocks`.
//!
//! Two-step handshake: the provider sends its current last-epoch (u64);
//! the subscriber replies with its desired start-epoch (u64). Epoch 0 is
//! reserved as the end-of-transmission sentinel rather than a legitimate
//! block epoch (spec §9 redesign note e) — the protocol starts at epoch 1,
//! so an all-zero 8-byte frame can never collide with a real header.

use axe_types::BoxedConnection;
use tracing::warn;

use crate::log::BlockLogError;

/// Buffers are flushed once they reach this size or the last epoch is
/// included (spec §4.G "≥16 MiB buffer").
const FLUSH_THRESHOLD: usize = 16 * 1024 * 1024;

/// End-of-transmission sentinel: eight zero bytes, never a valid epoch
/// (epoch 0 is reserved, spec §9.e).
pub const END_OF_TRANSMISSION: [u8; 8] = [0u8; 8];

/// Drives one subscriber connection to completion: handshake, bulk
/// transmit, terminator.
pub async fn transmit_blocks(
    conn: &BoxedConnection,
    last: u64,
    read_body: impl Fn(u64) -> Result<Vec<u8>, BlockLogError>,
) {
    if conn.send(last.to_le_bytes().to_vec()).await.is_err() {
        return;
    }
    let start_bytes = match conn.read().await {
        Ok(bytes) if bytes.len() == 8 => bytes,
        _ => {
            warn!("subscriber handshake: malformed start-epoch frame");
            return;
        }
    };
    let start = u64::from_le_bytes(start_bytes.try_into().unwrap());
    if start == 0 || start > last {
        let _ = conn.send(END_OF_TRANSMISSION.to_vec()).await;
        return;
    }

    let mut buffer = Vec::new();
    let mut count = 0u64;
    for epoch in start..=last {
        let body = match read_body(epoch) {
            Ok(body) => body,
            Err(err) => {
                warn!(epoch, %err, "failed to read persisted block, aborting transmit");
                return;
            }
        };
        let mut framed = (body.len() as u32).to_le_bytes().to_vec();
        framed.extend_from_slice(&body);
        buffer.extend_from_slice(&framed);
        count += 1;
        if buffer.len() > FLUSH_THRESHOLD || epoch == last {
            let mut out = count.to_le_bytes().to_vec();
            out.extend_from_slice(&buffer);
            if conn.send(out).await.is_err() {
                return;
            }
            buffer.clear();
            count = 0;
        }
    }
    let _ = conn.send(END_OF_TRANSMISSION.to_vec()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axe_types::loopback_pair;

    /// Seed scenario 5: empty result when the subscriber's start is past
    /// the provider's last epoch.
    #[tokio::test]
    async fn empty_range_yields_immediate_terminator() {
        let (provider_side, subscriber_side) = loopback_pair([1u8; 32], [2u8; 32]);
        let task = tokio::spawn(async move {
            transmit_blocks(&provider_side, 3, |_| Ok(vec![0u8; 9])).await;
        });

        let last = subscriber_side.read().await.unwrap();
        assert_eq!(u64::from_le_bytes(last.try_into().unwrap()), 3);
        subscriber_side.send(100u64.to_le_bytes().to_vec()).await.unwrap();
        let terminator = subscriber_side.read().await.unwrap();
        assert_eq!(terminator, END_OF_TRANSMISSION.to_vec());
        task.await.unwrap();
    }

    /// Seed scenario 6 (shape): bulk transmit of a contiguous epoch range
    /// ends with the terminator and carries every requested epoch.
    #[tokio::test]
    async fn bulk_transmit_sends_requested_range_then_terminator() {
        let (provider_side, subscriber_side) = loopback_pair([1u8; 32], [2u8; 32]);
        let task = tokio::spawn(async move {
            transmit_blocks(&provider_side, 5, |epoch| {
                let mut body = epoch.to_le_bytes().to_vec();
                body.extend_from_slice(b"xxxx");
                Ok(body)
            })
            .await;
        });

        let last = subscriber_side.read().await.unwrap();
        assert_eq!(u64::from_le_bytes(last.try_into().unwrap()), 5);
        subscriber_side.send(1u64.to_le_bytes().to_vec()).await.unwrap();

        let batch = subscriber_side.read().await.unwrap();
        let count = u64::from_le_bytes(batch[0..8].try_into().unwrap());
        assert_eq!(count, 5);

        let terminator = subscriber_side.read().await.unwrap();
        assert_eq!(terminator, END_OF_TRANSMISSION.to_vec());
        task.await.unwrap();
    }
}
