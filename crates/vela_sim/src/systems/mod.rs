//! # System Trait and Registry Order
//!
//! Each simulation concern is one struct implementing [`System`]. The
//! [`crate::Simulation`] runs them sequentially in fixed registration
//! order within a tick; there are no transactions, so later systems
//! observe earlier systems' writes that same tick.

use vela_core::WorldStore;

use crate::events::EventQueue;

pub mod combat;
pub mod economy;
pub mod fleet;
pub mod logistics;
pub mod sovereignty;

pub use combat::CombatSystem;
pub use economy::EconomySystem;
pub use fleet::FleetSystem;
pub use logistics::LogisticsSystem;
pub use sovereignty::SovereigntySystem;

/// One simulation pass over the world.
pub trait System {
    /// Stable system name for logging.
    fn name(&self) -> &'static str;

    /// Runs the system for one tick.
    ///
    /// `dt` is the elapsed simulation time in seconds; `now` is the
    /// simulation clock in seconds at the start of this tick. Per-entity
    /// failures are handled inline (status fields, cleared references,
    /// warnings) and never abort the tick.
    fn run(&mut self, world: &mut WorldStore, dt: f64, now: f64, events: &mut EventQueue);
}
