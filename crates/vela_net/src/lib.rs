//! # VELA Networking
//!
//! Everything between the authoritative world and a rendered client:
//!
//! ```text
//! server tick
//!   │
//!   ├─ InterestManager      who can see what (cubic cells)
//!   ├─ snapshot builder     world -> self-describing Value tree
//!   ├─ ConnectionChannel    full once, then field-level deltas
//!   │                                        │ wire
//!   ├─ SnapshotInterpolator render behind a fixed delay    (client)
//!   ├─ PredictionEngine     apply intents immediately      (client)
//!   └─ StateReconciler      eased corrections on deviation (client)
//! ```
//!
//! The wire format is binary and self-describing; a malformed packet is
//! dropped with a [`protocol::WireError`], never a crash.

pub mod client;
pub mod connection;
pub mod interest;
pub mod interpolate;
pub mod protocol;
pub mod snapshot;

pub use client::{CommandBuffer, PredictionEngine, StateReconciler};
pub use connection::ConnectionChannel;
pub use interest::InterestManager;
pub use interpolate::SnapshotInterpolator;
pub use protocol::{Value, WireError};
pub use snapshot::{entity_snapshot, snapshot_position, world_snapshot};
