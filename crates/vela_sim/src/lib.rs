//! # VELA Simulation
//!
//! The authoritative world simulation: five systems run once per tick in a
//! fixed, load-bearing order, so later systems observe earlier systems'
//! writes that same tick.
//!
//! ```text
//! step(dt)
//!   │
//!   ├─ Economy     zero accumulators, buildings + chains, fold into stock
//!   ├─ Logistics   queued transfers -> cargo entities, advance cargo
//!   ├─ Combat      target upkeep, cooldown, shield arc, damage
//!   ├─ Sovereignty influence growth, foreign-control taxation
//!   └─ Fleet       formation smoothing, jump drives
//!   │
//!   └─ events drained by presentation collaborators, once per tick
//! ```
//!
//! All timing uses the simulation clock carried by [`Simulation`], never
//! wall-clock reads, so replaying the same command log with the same dt
//! sequence reproduces the world exactly.

pub mod command;
pub mod events;
pub mod simulation;
pub mod systems;
pub mod tick;

pub use command::{apply_command, Command, CommandError};
pub use events::{EventQueue, SimEvent};
pub use simulation::Simulation;
pub use systems::System;
pub use tick::{TickLoop, TickStats};
