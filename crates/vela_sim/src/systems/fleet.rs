//! # Fleet System
//!
//! Formation flying and jump drives.
//!
//! ## Formations
//!
//! ```text
//! circle           line              delta
//!    · ·                                ·
//!  ·     ·        · · F · ·           · ·
//!  ·  F  ·                           ·  ·  ·
//!    · ·
//! ```
//!
//! Each member gets an offset target parameterized by its slot index and
//! the member count, then its actual position is exponentially smoothed
//! toward that target every tick. Jumps advance independently; on
//! completion the fleet and every member teleport to the destination.

use vela_core::{ComponentKind, EntityId, Formation, Position, WorldStore};

use crate::events::{EventQueue, SimEvent};
use crate::systems::System;

/// Distance between formation slots, world units.
const FORMATION_SPACING: f64 = 5.0;
/// Fraction of the remaining offset closed per tick.
const SMOOTHING_FACTOR: f64 = 0.1;
/// Jump progress per second (2 second jump).
const JUMP_RATE: f64 = 0.5;

/// Formation smoothing and jump resolution.
#[derive(Debug, Default)]
pub struct FleetSystem;

impl System for FleetSystem {
    fn name(&self) -> &'static str {
        "fleet"
    }

    fn run(&mut self, world: &mut WorldStore, dt: f64, _now: f64, events: &mut EventQueue) {
        let fleets = world.entities_with(&[ComponentKind::Fleet, ComponentKind::Position]);

        for fleet_id in fleets {
            let Some(fleet) = world.fleet(fleet_id).cloned() else {
                continue;
            };
            let Some(fleet_pos) = world.position(fleet_id).copied() else {
                continue;
            };

            update_formation(world, &fleet.members, fleet.formation, fleet_pos);
            update_jump(world, fleet_id, dt, events);
        }
    }
}

fn update_formation(
    world: &mut WorldStore,
    members: &[EntityId],
    formation: Formation,
    fleet_pos: Position,
) {
    let placed: Vec<EntityId> = members
        .iter()
        .copied()
        .filter(|m| world.has(*m, ComponentKind::Position))
        .collect();
    if placed.is_empty() {
        return;
    }

    let total = placed.len();
    for (index, member) in placed.into_iter().enumerate() {
        let offset = formation_offset(formation, index, total);
        if let Some(pos) = world.position_mut(member) {
            pos.x += (fleet_pos.x + offset.x - pos.x) * SMOOTHING_FACTOR;
            pos.y += (fleet_pos.y + offset.y - pos.y) * SMOOTHING_FACTOR;
            pos.z += (fleet_pos.z + offset.z - pos.z) * SMOOTHING_FACTOR;
        }
    }
}

/// Slot offset for one member, relative to the fleet anchor.
fn formation_offset(formation: Formation, index: usize, total: usize) -> Position {
    #[allow(clippy::cast_precision_loss)]
    match formation {
        Formation::Line => {
            let center = (total as f64 - 1.0) / 2.0;
            Position::new((index as f64 - center) * FORMATION_SPACING, 0.0, 0.0)
        }
        Formation::Delta => {
            let row = (index as f64).sqrt().floor();
            let col = index as f64 - row * row;
            Position::new(
                (col - row) * FORMATION_SPACING,
                0.0,
                -row * FORMATION_SPACING,
            )
        }
        Formation::Circle => {
            let angle = (index as f64 / total as f64) * std::f64::consts::TAU;
            Position::new(
                angle.cos() * FORMATION_SPACING,
                0.0,
                angle.sin() * FORMATION_SPACING,
            )
        }
    }
}

fn update_jump(world: &mut WorldStore, fleet_id: EntityId, dt: f64, events: &mut EventQueue) {
    let Some(fleet) = world.fleet_mut(fleet_id) else {
        return;
    };
    if !fleet.jumping {
        return;
    }

    fleet.jump_progress += JUMP_RATE * dt;
    if fleet.jump_progress < 1.0 {
        return;
    }

    fleet.jumping = false;
    fleet.jump_progress = 0.0;
    let destination = fleet.destination.take();
    let members = fleet.members.clone();

    if let Some(arrival) = destination {
        if let Some(pos) = world.position_mut(fleet_id) {
            *pos = arrival;
        }
        for member in members {
            if let Some(pos) = world.position_mut(member) {
                *pos = arrival;
            }
        }
        events.push(SimEvent::JumpCompleted {
            fleet: fleet_id,
            arrival,
        });
    }
}
