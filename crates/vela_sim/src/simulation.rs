//! # Simulation Driver
//!
//! Owns the world, the ordered system list, the simulation clock and the
//! outbound event queue. `step(dt)` is the only way time advances, so a
//! replay of the same command log with the same dt sequence reproduces
//! the world exactly.

use vela_core::WorldStore;

use crate::command::{apply_command, Command, CommandError};
use crate::events::{EventQueue, SimEvent};
use crate::systems::{
    CombatSystem, EconomySystem, FleetSystem, LogisticsSystem, SovereigntySystem, System,
};

/// The authoritative simulation: world plus systems in fixed order.
pub struct Simulation {
    world: WorldStore,
    systems: Vec<Box<dyn System + Send>>,
    events: EventQueue,
    /// Simulation clock in seconds, sum of all applied dt.
    clock: f64,
    /// Completed tick count.
    tick: u64,
}

impl Simulation {
    /// Creates a simulation with the standard system order:
    /// Economy, Logistics, Combat, Sovereignty, Fleet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            world: WorldStore::new(),
            systems: vec![
                Box::new(EconomySystem),
                Box::new(LogisticsSystem),
                Box::new(CombatSystem),
                Box::new(SovereigntySystem),
                Box::new(FleetSystem),
            ],
            events: EventQueue::new(),
            clock: 0.0,
            tick: 0,
        }
    }

    /// Validates and applies one command before the next tick's systems.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason; the world is untouched and the tick
    /// is unaffected.
    pub fn apply(&mut self, command: &Command) -> Result<(), CommandError> {
        apply_command(&mut self.world, command)
    }

    /// Advances the world by `dt` seconds: runs every system once, in
    /// registration order.
    pub fn step(&mut self, dt: f64) {
        let now = self.clock;
        for system in &mut self.systems {
            tracing::trace!(system = system.name(), tick = self.tick, "running system");
            system.run(&mut self.world, dt, now, &mut self.events);
        }
        self.clock += dt;
        self.tick += 1;
    }

    /// Takes every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    /// Read access to the world.
    #[must_use]
    pub fn world(&self) -> &WorldStore {
        &self.world
    }

    /// Mutable access to the world (setup and command paths).
    pub fn world_mut(&mut self) -> &mut WorldStore {
        &mut self.world
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Completed ticks.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
