//! # Economy System
//!
//! Production is rate-based, not per-tick-fixed: every yield and chain
//! rate is units per second, pro-rated by the elapsed tick duration, so
//! variable tick lengths stay correct.
//!
//! ## Pass Order
//!
//! 1. Zero every economy entity's production accumulator
//! 2. For each active building: static per-level yield table, or its
//!    declared input/output chain (all-or-nothing input check)
//! 3. Fold `production × dt` into every entity's durable stock
//!
//! A short input stalls the whole chain with no partial consumption.
//! Resource shortage is a status, not an error.

use vela_core::{BuildingKind, ChainStatus, ComponentKind, ResourceKind, WorldStore};

use crate::events::EventQueue;
use crate::systems::System;

/// Metal yield per mine level, per second.
const MINE_METAL_RATE: f64 = 10.0;
/// Energy yield per generator level, per second.
const GENERATOR_ENERGY_RATE: f64 = 15.0;
/// Credit yield per habitat level, per second.
const HABITAT_CREDIT_RATE: f64 = 5.0;

/// Resource production from buildings and declared chains.
#[derive(Debug, Default)]
pub struct EconomySystem;

impl System for EconomySystem {
    fn name(&self) -> &'static str {
        "economy"
    }

    fn run(&mut self, world: &mut WorldStore, dt: f64, _now: f64, _events: &mut EventQueue) {
        let economy_entities = world.entities_with(&[ComponentKind::Economy]);
        for entity in &economy_entities {
            if let Some(economy) = world.economy_mut(*entity) {
                economy.production.clear();
            }
        }

        let building_entities =
            world.entities_with(&[ComponentKind::Building, ComponentKind::Economy]);
        for entity in building_entities {
            let Some(building) = world.building(entity).copied() else {
                continue;
            };
            if !building.active {
                continue;
            }

            if world.has(entity, ComponentKind::ProductionChain) {
                run_chain(world, entity, dt);
            } else {
                // Legacy yield table: flat rate scaled by level.
                let level = f64::from(building.level);
                if let Some(economy) = world.economy_mut(entity) {
                    match building.kind {
                        BuildingKind::Mine => economy.production.metal += MINE_METAL_RATE * level,
                        BuildingKind::Generator => {
                            economy.production.energy += GENERATOR_ENERGY_RATE * level;
                        }
                        BuildingKind::Habitat => {
                            economy.production.credits += HABITAT_CREDIT_RATE * level;
                        }
                    }
                }
            }
        }

        for entity in economy_entities {
            if let Some(economy) = world.economy_mut(entity) {
                economy.stock.metal += economy.production.metal * dt;
                economy.stock.energy += economy.production.energy * dt;
                economy.stock.credits += economy.production.credits * dt;
            }
        }
    }
}

/// Evaluates one declared chain: all inputs must cover `rate × dt` or the
/// chain stalls with nothing consumed.
fn run_chain(world: &mut WorldStore, entity: vela_core::EntityId, dt: f64) {
    let Some(chain) = world.production_chain(entity).cloned() else {
        return;
    };
    let Some(economy) = world.economy(entity).copied() else {
        return;
    };

    let short_input: Option<ResourceKind> = chain
        .inputs
        .iter()
        .find(|(resource, rate)| economy.stock.get(*resource) < rate * dt)
        .map(|(resource, _)| *resource);

    let status = if let Some(resource) = short_input {
        tracing::trace!(%entity, ?resource, "production chain stalled on input");
        ChainStatus::StalledInput
    } else {
        if let Some(economy) = world.economy_mut(entity) {
            for (resource, rate) in &chain.inputs {
                economy.stock.add(*resource, -(rate * dt));
            }
            for (resource, rate) in &chain.outputs {
                economy.production.add(*resource, *rate);
            }
        }
        ChainStatus::Producing
    };

    if let Some(chain) = world.production_chain_mut(entity) {
        chain.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{Building, Component, Economy, ProductionChain};

    fn tick(world: &mut WorldStore, dt: f64) {
        let mut events = EventQueue::new();
        EconomySystem.run(world, dt, 0.0, &mut events);
    }

    #[test]
    fn test_no_building_leaves_stock_unchanged() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Economy(Economy::with_stock(1000.0, 500.0, 100.0)));

        tick(&mut world, 1.0);

        let economy = world.economy(e).unwrap();
        assert!((economy.stock.metal - 1000.0).abs() < f64::EPSILON);
        assert!((economy.stock.energy - 500.0).abs() < f64::EPSILON);
        assert!((economy.stock.credits - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mine_yield_scales_with_level() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Economy(Economy::default()));
        world.add_component(
            e,
            Component::Building(Building {
                kind: BuildingKind::Mine,
                level: 2,
                active: true,
            }),
        );

        tick(&mut world, 1.0);

        assert!((world.economy(e).unwrap().stock.metal - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_inactive_building_produces_nothing() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Economy(Economy::default()));
        world.add_component(
            e,
            Component::Building(Building {
                kind: BuildingKind::Generator,
                level: 3,
                active: false,
            }),
        );

        tick(&mut world, 1.0);

        assert!(world.economy(e).unwrap().stock.energy.abs() < f64::EPSILON);
    }

    #[test]
    fn test_chain_produces_when_inputs_cover() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Economy(Economy::with_stock(100.0, 100.0, 100.0)));
        world.add_component(
            e,
            Component::Building(Building {
                kind: BuildingKind::Generator,
                level: 1,
                active: true,
            }),
        );
        world.add_component(
            e,
            Component::ProductionChain(ProductionChain {
                inputs: vec![(ResourceKind::Metal, 5.0)],
                outputs: vec![(ResourceKind::Energy, 10.0)],
                status: ChainStatus::Idle,
            }),
        );

        tick(&mut world, 1.0);

        let economy = world.economy(e).unwrap();
        assert!((economy.stock.metal - 95.0).abs() < f64::EPSILON);
        assert!((economy.stock.energy - 110.0).abs() < f64::EPSILON);
        assert_eq!(
            world.production_chain(e).unwrap().status,
            ChainStatus::Producing
        );
    }

    #[test]
    fn test_chain_stalls_without_partial_consumption() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Economy(Economy::with_stock(2.0, 100.0, 100.0)));
        world.add_component(
            e,
            Component::Building(Building {
                kind: BuildingKind::Generator,
                level: 1,
                active: true,
            }),
        );
        world.add_component(
            e,
            Component::ProductionChain(ProductionChain {
                inputs: vec![(ResourceKind::Metal, 5.0)],
                outputs: vec![(ResourceKind::Energy, 10.0)],
                status: ChainStatus::Idle,
            }),
        );

        tick(&mut world, 1.0);

        let economy = world.economy(e).unwrap();
        assert!((economy.stock.metal - 2.0).abs() < f64::EPSILON);
        assert!((economy.stock.energy - 100.0).abs() < f64::EPSILON);
        assert_eq!(
            world.production_chain(e).unwrap().status,
            ChainStatus::StalledInput
        );
    }

    #[test]
    fn test_production_pro_rated_by_dt() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Economy(Economy::default()));
        world.add_component(
            e,
            Component::Building(Building {
                kind: BuildingKind::Mine,
                level: 1,
                active: true,
            }),
        );

        tick(&mut world, 0.5);

        assert!((world.economy(e).unwrap().stock.metal - 5.0).abs() < f64::EPSILON);
    }
}
