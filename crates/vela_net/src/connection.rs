//! # Connection Channel
//!
//! Per-connection snapshot state and the outbound packet path.
//!
//! The first snapshot a connection receives is always `full`; every
//! later one is a field-level delta against the last committed snapshot.
//! The committed baseline lives behind a mutex held across
//! compute-then-commit-then-send, so two concurrent sends for the same
//! connection can never interleave and desynchronize the baseline.

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::protocol::{diff, encode_packet, SnapshotKind, SnapshotPacket, Value};

/// Per-connection traffic statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectionMetrics {
    /// Packets actually sent.
    pub packets_sent: u64,
    /// Bytes actually sent.
    pub bytes_sent: u64,
    /// Bytes avoided versus always sending full snapshots.
    pub bytes_saved: u64,
    /// Full snapshots sent.
    pub full_snapshots: u64,
    /// Delta snapshots sent.
    pub delta_snapshots: u64,
    /// Ticks where nothing changed and nothing was sent.
    pub empty_deltas: u64,
}

/// One client's outbound snapshot pipeline.
pub struct ConnectionChannel {
    outbound: Sender<Vec<u8>>,
    /// Last committed snapshot; `None` until the first full send.
    baseline: Mutex<Option<Value>>,
    metrics: Mutex<ConnectionMetrics>,
}

impl ConnectionChannel {
    /// Wraps an outbound transport channel.
    #[must_use]
    pub fn new(outbound: Sender<Vec<u8>>) -> Self {
        Self {
            outbound,
            baseline: Mutex::new(None),
            metrics: Mutex::new(ConnectionMetrics::default()),
        }
    }

    /// Sends this tick's snapshot: full on first contact, delta after,
    /// nothing at all when nothing changed.
    ///
    /// Returns false if the transport is gone.
    pub fn send_snapshot(&self, tick: u64, timestamp: f64, snapshot: Value) -> bool {
        // Held across compute + commit + send: no interleaved recompute.
        let mut baseline = self.baseline.lock();

        let full_packet = SnapshotPacket {
            kind: SnapshotKind::Full,
            tick,
            timestamp,
            payload: snapshot.clone(),
        };
        let full_bytes = encode_packet(&full_packet);

        let bytes = match baseline.as_ref() {
            None => {
                self.metrics.lock().full_snapshots += 1;
                full_bytes
            }
            Some(previous) => match diff(previous, &snapshot) {
                None => {
                    let mut metrics = self.metrics.lock();
                    metrics.empty_deltas += 1;
                    metrics.bytes_saved += full_bytes.len() as u64;
                    *baseline = Some(snapshot);
                    return true;
                }
                Some(delta) => {
                    let delta_bytes = encode_packet(&SnapshotPacket {
                        kind: SnapshotKind::Delta,
                        tick,
                        timestamp,
                        payload: delta,
                    });
                    let mut metrics = self.metrics.lock();
                    metrics.delta_snapshots += 1;
                    metrics.bytes_saved +=
                        (full_bytes.len().saturating_sub(delta_bytes.len())) as u64;
                    delta_bytes
                }
            },
        };

        *baseline = Some(snapshot);

        let mut metrics = self.metrics.lock();
        metrics.packets_sent += 1;
        metrics.bytes_sent += bytes.len() as u64;
        drop(metrics);

        if self.outbound.send(bytes).is_err() {
            tracing::warn!(tick, "outbound channel closed, dropping connection state");
            return false;
        }
        true
    }

    /// Current traffic statistics.
    #[must_use]
    pub fn metrics(&self) -> ConnectionMetrics {
        *self.metrics.lock()
    }
}
