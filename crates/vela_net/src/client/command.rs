//! # Command Buffer
//!
//! Bounded id-keyed store for in-flight commands. An entry is pending
//! until its first confirm or reject, which moves it to a side map in
//! O(1); it transitions exactly once. Overflow evicts the oldest ~10%,
//! and entries past the max age are purged on a fixed add cadence
//! (abandoned, not rolled back).

use std::collections::BTreeMap;

use vela_sim::Command;

/// Default capacity before eviction.
pub const DEFAULT_MAX_SIZE: usize = 100;
/// Default pending age limit, milliseconds.
pub const DEFAULT_MAX_AGE_MS: f64 = 30_000.0;
/// Adds between expiry sweeps.
const CLEANUP_CADENCE: u32 = 10;

/// One tracked command.
#[derive(Clone, Debug)]
pub struct BufferedCommand {
    /// The command itself.
    pub command: Command,
    /// Client time it was issued, milliseconds.
    pub issued_at_ms: f64,
}

/// Bounded in-flight command store.
pub struct CommandBuffer {
    max_size: usize,
    max_age_ms: f64,
    /// Awaiting a verdict, ordered by id (ids are monotonic).
    pending: BTreeMap<u64, BufferedCommand>,
    /// Acknowledged by the authority.
    confirmed: BTreeMap<u64, BufferedCommand>,
    /// Refused by the authority.
    rejected: BTreeMap<u64, BufferedCommand>,
    adds_since_cleanup: u32,
}

impl CommandBuffer {
    /// Creates a buffer with explicit bounds.
    #[must_use]
    pub fn new(max_size: usize, max_age_ms: f64) -> Self {
        Self {
            max_size: max_size.max(1),
            max_age_ms,
            pending: BTreeMap::new(),
            confirmed: BTreeMap::new(),
            rejected: BTreeMap::new(),
            adds_since_cleanup: 0,
        }
    }

    /// Tracks a new pending command.
    ///
    /// Returns the ids this add expired or evicted (abandoned commands;
    /// their speculative effects stay applied).
    pub fn add(&mut self, id: u64, command: Command, now_ms: f64) -> Vec<u64> {
        let mut dropped = Vec::new();

        self.adds_since_cleanup += 1;
        if self.adds_since_cleanup >= CLEANUP_CADENCE {
            self.adds_since_cleanup = 0;
            dropped.extend(self.purge_expired(now_ms));
        }

        if self.pending.len() >= self.max_size {
            // Evict the oldest ~10%.
            let evict_count = (self.max_size / 10).max(1);
            let victims: Vec<u64> = self.pending.keys().take(evict_count).copied().collect();
            for victim in victims {
                self.pending.remove(&victim);
                dropped.push(victim);
            }
            tracing::debug!(evicted = evict_count, "command buffer overflow");
        }

        self.pending.insert(
            id,
            BufferedCommand {
                command,
                issued_at_ms: now_ms,
            },
        );
        dropped
    }

    /// Moves a pending command to the confirmed map.
    ///
    /// Returns `None` when the id is unknown or already settled.
    pub fn confirm(&mut self, id: u64) -> Option<&BufferedCommand> {
        let entry = self.pending.remove(&id)?;
        self.confirmed.insert(id, entry);
        self.confirmed.get(&id)
    }

    /// Moves a pending command to the rejected map.
    pub fn reject(&mut self, id: u64) -> Option<&BufferedCommand> {
        let entry = self.pending.remove(&id)?;
        self.rejected.insert(id, entry);
        self.rejected.get(&id)
    }

    /// Drops every pending entry older than the max age, returning the
    /// abandoned ids.
    pub fn purge_expired(&mut self, now_ms: f64) -> Vec<u64> {
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, entry)| now_ms - entry.issued_at_ms > self.max_age_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.pending.remove(id);
            tracing::debug!(id, "abandoning expired command");
        }
        expired
    }

    /// Pending commands in issue order.
    pub fn pending(&self) -> impl Iterator<Item = (u64, &BufferedCommand)> {
        self.pending.iter().map(|(id, entry)| (*id, entry))
    }

    /// A pending entry by id.
    #[must_use]
    pub fn get_pending(&self, id: u64) -> Option<&BufferedCommand> {
        self.pending.get(&id)
    }

    /// Number of pending commands.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the command was confirmed.
    #[must_use]
    pub fn is_confirmed(&self, id: u64) -> bool {
        self.confirmed.contains_key(&id)
    }

    /// Whether the command was rejected.
    #[must_use]
    pub fn is_rejected(&self, id: u64) -> bool {
        self.rejected.contains_key(&id)
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_MAX_AGE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{EntityId, Position};

    fn cmd() -> Command {
        Command::MoveFleet {
            fleet: EntityId(1),
            destination: Position::new(1.0, 0.0, 0.0),
        }
    }

    #[test]
    fn test_transition_happens_once() {
        let mut buffer = CommandBuffer::default();
        buffer.add(1, cmd(), 0.0);

        assert!(buffer.confirm(1).is_some());
        assert!(buffer.confirm(1).is_none());
        assert!(buffer.reject(1).is_none());
        assert!(buffer.is_confirmed(1));
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_overflow_evicts_oldest_tenth() {
        let mut buffer = CommandBuffer::new(100, f64::MAX);
        for id in 0..100 {
            buffer.add(id, cmd(), 0.0);
        }
        assert_eq!(buffer.pending_len(), 100);

        let dropped = buffer.add(100, cmd(), 0.0);
        assert_eq!(dropped, (0..10).collect::<Vec<u64>>());
        assert_eq!(buffer.pending_len(), 91);
        assert!(buffer.get_pending(100).is_some());
    }

    #[test]
    fn test_expiry_sweep_on_cadence() {
        let mut buffer = CommandBuffer::new(100, 1000.0);
        buffer.add(0, cmd(), 0.0);

        // Nine more adds trigger the sweep; the first command is stale.
        for id in 1..9 {
            buffer.add(id, cmd(), 5000.0);
        }
        let dropped = buffer.add(9, cmd(), 5000.0);

        assert!(dropped.contains(&0));
        assert!(buffer.get_pending(0).is_none());
        assert!(buffer.get_pending(9).is_some());
    }

    #[test]
    fn test_pending_iterates_in_issue_order() {
        let mut buffer = CommandBuffer::default();
        buffer.add(3, cmd(), 0.0);
        buffer.add(1, cmd(), 0.0);
        buffer.add(2, cmd(), 0.0);

        let ids: Vec<u64> = buffer.pending().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
