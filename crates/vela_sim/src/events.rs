//! # Simulation Events
//!
//! Systems never call out to presentation code. Anything a renderer or
//! network layer might care about is pushed onto an explicit queue and
//! drained exactly once per tick by whoever owns the simulation.

use vela_core::{EntityId, Position, Resources};

/// One observable simulation occurrence.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// A combat entity fired at its target.
    WeaponFired {
        /// Firing entity.
        attacker: EntityId,
        /// Entity that was hit.
        target: EntityId,
        /// Attacker position at fire time.
        attacker_pos: Position,
        /// Target position at fire time.
        target_pos: Position,
        /// Damage that reached the hull after shield absorption.
        hull_damage: f64,
    },
    /// A cargo entity reached its target and unloaded.
    CargoDelivered {
        /// The cargo entity (destroyed after this event).
        cargo: EntityId,
        /// Receiving entity.
        target: EntityId,
        /// Resources moved into the target's stock.
        delivered: Resources,
    },
    /// A fleet finished its jump and teleported.
    JumpCompleted {
        /// The fleet entity.
        fleet: EntityId,
        /// Where the fleet arrived.
        arrival: Position,
    },
}

/// Outbound event queue, drained once per tick.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes one event.
    #[inline]
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Takes all queued events, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = EventQueue::new();
        queue.push(SimEvent::JumpCompleted {
            fleet: EntityId(1),
            arrival: Position::new(1.0, 0.0, 0.0),
        });
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }
}
