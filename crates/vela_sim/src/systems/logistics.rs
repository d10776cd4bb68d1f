//! # Logistics System
//!
//! Two passes per tick:
//!
//! 1. Every hub's queued abstract transfers become concrete cargo
//!    entities (position copied from the hub, velocity, cargo payload
//!    with target) and the requests are removed.
//! 2. Existing cargo advances toward its target at fixed speed; on
//!    arrival (distance < 1.0) the inventory empties into the target's
//!    stock and the cargo entity is destroyed.
//!
//! A cargo whose target vanished is a dangling reference: logged and
//! destroyed, never left to drift.

use vela_core::{
    Cargo, CargoStatus, Component, ComponentKind, Position, Resources, Velocity, WorldStore,
};

use crate::events::{EventQueue, SimEvent};
use crate::systems::System;

/// Cargo travel speed, world units per second.
const CARGO_SPEED: f64 = 0.05;
/// Arrival radius around the target.
const ARRIVAL_DISTANCE: f64 = 1.0;

/// Transfer queue draining and cargo movement.
#[derive(Debug, Default)]
pub struct LogisticsSystem;

impl System for LogisticsSystem {
    fn name(&self) -> &'static str {
        "logistics"
    }

    fn run(&mut self, world: &mut WorldStore, dt: f64, _now: f64, events: &mut EventQueue) {
        spawn_cargo(world);
        advance_cargo(world, dt, events);
    }
}

/// Drains every hub's transfer queue into cargo entities.
fn spawn_cargo(world: &mut WorldStore) {
    let hubs = world.entities_with(&[ComponentKind::Logistics, ComponentKind::Position]);
    for hub in hubs {
        let Some(hub_pos) = world.position(hub).copied() else {
            continue;
        };
        let transfers = match world.logistics_mut(hub) {
            Some(logistics) => std::mem::take(&mut logistics.transfers),
            None => continue,
        };

        for transfer in transfers {
            let mut inventory = Resources::default();
            inventory.add(transfer.resource, transfer.amount);

            let cargo = world.create_entity();
            world.add_component(cargo, Component::Position(hub_pos));
            world.add_component(cargo, Component::Velocity(Velocity::default()));
            world.add_component(
                cargo,
                Component::Cargo(Cargo {
                    inventory,
                    capacity: transfer.amount * 2.0,
                    origin: Some(hub),
                    target: Some(transfer.target),
                    status: CargoStatus::Traveling,
                }),
            );
        }
    }
}

/// Moves traveling cargo and unloads arrivals.
fn advance_cargo(world: &mut WorldStore, dt: f64, events: &mut EventQueue) {
    let cargos = world.entities_with(&[
        ComponentKind::Cargo,
        ComponentKind::Position,
        ComponentKind::Velocity,
    ]);

    for cargo_id in cargos {
        let Some(cargo) = world.cargo(cargo_id).copied() else {
            continue;
        };
        if cargo.status != CargoStatus::Traveling {
            continue;
        }
        let Some(target) = cargo.target else {
            continue;
        };
        let Some(pos) = world.position(cargo_id).copied() else {
            continue;
        };

        let Some(target_pos) = world.position(target).copied() else {
            tracing::warn!(cargo = %cargo_id, %target, "cargo target vanished, destroying cargo");
            world.destroy_entity(cargo_id);
            continue;
        };

        let dx = target_pos.x - pos.x;
        let dy = target_pos.y - pos.y;
        let dz = target_pos.z - pos.z;
        let dist = (dx * dx + dy * dy + dz * dz).sqrt();

        if dist < ARRIVAL_DISTANCE {
            unload(world, cargo_id, target, cargo.inventory, events);
        } else {
            let (vx, vy, vz) = (
                dx / dist * CARGO_SPEED,
                dy / dist * CARGO_SPEED,
                dz / dist * CARGO_SPEED,
            );
            if let Some(vel) = world.velocity_mut(cargo_id) {
                *vel = Velocity { vx, vy, vz };
            }
            if let Some(pos) = world.position_mut(cargo_id) {
                pos.x += vx * dt;
                pos.y += vy * dt;
                pos.z += vz * dt;
            }
        }
    }
}

fn unload(
    world: &mut WorldStore,
    cargo_id: vela_core::EntityId,
    target: vela_core::EntityId,
    inventory: Resources,
    events: &mut EventQueue,
) {
    if let Some(cargo) = world.cargo_mut(cargo_id) {
        cargo.status = CargoStatus::Unloading;
        cargo.inventory.clear();
    }
    if let Some(economy) = world.economy_mut(target) {
        economy.stock.metal += inventory.metal;
        economy.stock.energy += inventory.energy;
        economy.stock.credits += inventory.credits;
    }
    events.push(SimEvent::CargoDelivered {
        cargo: cargo_id,
        target,
        delivered: inventory,
    });
    world.destroy_entity(cargo_id);
}
