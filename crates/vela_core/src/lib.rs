//! # VELA Core World Store
//!
//! The entity/component data store every other VELA crate builds on:
//!
//! - Entities are opaque ids with no inherent data
//! - Components form a closed tagged union; each kind owns one bitmask bit
//! - Queries are memoized per target mask and patched incrementally on
//!   every mutation - never rebuilt wholesale
//!
//! ## Ordering Rules
//!
//! 1. **No transactions** - systems run sequentially in fixed registration
//!    order within a tick, so later systems observe earlier systems' writes
//! 2. **Deterministic iteration** - entity sets are ordered collections so
//!    replaying the same mutations yields identical results
//!
//! ## Example
//!
//! ```rust,ignore
//! use vela_core::{WorldStore, Component, ComponentKind, Position};
//!
//! let mut world = WorldStore::new();
//! let ship = world.create_entity();
//! world.add_component(ship, Component::Position(Position::new(1.0, 2.0, 3.0)));
//! let moving = world.entities_with(&[ComponentKind::Position]);
//! ```

pub mod ecs;

pub use ecs::component::{
    Building, BuildingKind, Cargo, CargoStatus, ChainStatus, Combat, Component, ComponentKind,
    Corporation, Economy, Fleet, Formation, Identity, Logistics, Position, ProductionChain,
    ResourceKind, Resources, Rotation, ShieldArc, Sovereignty, Transfer, Velocity, ALL_KINDS,
    KIND_COUNT,
};
pub use ecs::entity::EntityId;
pub use ecs::world::WorldStore;
