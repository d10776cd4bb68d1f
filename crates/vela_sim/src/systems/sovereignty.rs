//! # Sovereignty System
//!
//! Territorial influence and foreign-control taxation.
//!
//! Influence grows at a fixed rate toward the cap while an owner holds
//! the claim. Taxation runs after Economy in the same tick, so the
//! accumulators still hold this tick's production rates: for every
//! economy entity whose sovereignty owner differs from its identity
//! owner, the tax fraction of this tick's credit production moves from
//! the entity's stock into the controlling corporation's treasury.

use vela_core::{ComponentKind, WorldStore};

use crate::events::EventQueue;
use crate::systems::System;

/// Influence growth and sovereignty taxation.
#[derive(Debug, Default)]
pub struct SovereigntySystem;

impl System for SovereigntySystem {
    fn name(&self) -> &'static str {
        "sovereignty"
    }

    fn run(&mut self, world: &mut WorldStore, dt: f64, _now: f64, _events: &mut EventQueue) {
        grow_influence(world, dt);
        collect_taxes(world, dt);
    }
}

fn grow_influence(world: &mut WorldStore, dt: f64) {
    use vela_core::Sovereignty;

    let claimed = world.entities_with(&[ComponentKind::Sovereignty]);
    for entity in claimed {
        if let Some(sovereignty) = world.sovereignty_mut(entity) {
            if sovereignty.owner.is_some() {
                sovereignty.influence = Sovereignty::INFLUENCE_CAP
                    .min(sovereignty.influence + Sovereignty::INFLUENCE_RATE * dt);
            }
        }
    }
}

fn collect_taxes(world: &mut WorldStore, dt: f64) {
    let taxable = world.entities_with(&[
        ComponentKind::Economy,
        ComponentKind::Identity,
        ComponentKind::Sovereignty,
    ]);

    for entity in taxable {
        let Some(identity_owner) = world.identity(entity).and_then(|i| i.owner) else {
            continue;
        };
        let Some(sovereignty) = world.sovereignty(entity).copied() else {
            continue;
        };
        let Some(sovereign_owner) = sovereignty.owner else {
            continue;
        };
        if sovereign_owner == identity_owner {
            continue;
        }

        let credit_rate = world.economy(entity).map_or(0.0, |e| e.production.credits);
        let tax = credit_rate * sovereignty.tax_rate * dt;
        if tax <= 0.0 {
            continue;
        }

        let Some(corporation) = world.corporation_mut(sovereign_owner) else {
            tracing::warn!(
                %entity,
                owner = %sovereign_owner,
                "sovereignty owner has no corporation, tax skipped"
            );
            continue;
        };
        corporation.treasury += tax;
        if let Some(economy) = world.economy_mut(entity) {
            economy.stock.credits -= tax;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{
        Component, Corporation, Economy, EntityId, Identity, Resources, Sovereignty,
    };

    fn tick(world: &mut WorldStore, dt: f64) {
        let mut events = EventQueue::new();
        SovereigntySystem.run(world, dt, 0.0, &mut events);
    }

    fn corp(world: &mut WorldStore) -> EntityId {
        let e = world.create_entity();
        world.add_component(e, Component::Corporation(Corporation::default()));
        e
    }

    #[test]
    fn test_influence_grows_toward_cap() {
        let mut world = WorldStore::new();
        let owner = corp(&mut world);
        let claim = world.create_entity();
        world.add_component(
            claim,
            Component::Sovereignty(Sovereignty {
                owner: Some(owner),
                influence: 99.0,
                tax_rate: 0.0,
            }),
        );

        tick(&mut world, 1.0);
        assert!((world.sovereignty(claim).unwrap().influence - 100.0).abs() < f64::EPSILON);

        // Capped.
        tick(&mut world, 5.0);
        assert!((world.sovereignty(claim).unwrap().influence - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unclaimed_influence_static() {
        let mut world = WorldStore::new();
        let claim = world.create_entity();
        world.add_component(claim, Component::Sovereignty(Sovereignty::default()));

        tick(&mut world, 1.0);
        assert!(world.sovereignty(claim).unwrap().influence.abs() < f64::EPSILON);
    }

    fn taxed_colony(world: &mut WorldStore, sovereign: EntityId, resident: EntityId) -> EntityId {
        let colony = world.create_entity();
        world.add_component(
            colony,
            Component::Economy(Economy {
                stock: Resources::new(0.0, 0.0, 1000.0),
                production: Resources::new(0.0, 0.0, 10.0),
            }),
        );
        world.add_component(
            colony,
            Component::Identity(Identity {
                owner: Some(resident),
            }),
        );
        world.add_component(
            colony,
            Component::Sovereignty(Sovereignty {
                owner: Some(sovereign),
                influence: 50.0,
                tax_rate: 0.2,
            }),
        );
        colony
    }

    #[test]
    fn test_foreign_control_taxes_credit_production() {
        let mut world = WorldStore::new();
        let sovereign = corp(&mut world);
        let resident = corp(&mut world);
        let colony = taxed_colony(&mut world, sovereign, resident);

        tick(&mut world, 1.0);

        // 10 credits/s production, 20% tax, 1s tick.
        assert!((world.corporation(sovereign).unwrap().treasury - 2.0).abs() < f64::EPSILON);
        assert!((world.economy(colony).unwrap().stock.credits - 998.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_own_sovereignty_untaxed() {
        let mut world = WorldStore::new();
        let owner = corp(&mut world);
        let colony = taxed_colony(&mut world, owner, owner);

        tick(&mut world, 1.0);

        assert!(world.corporation(owner).unwrap().treasury.abs() < f64::EPSILON);
        assert!((world.economy(colony).unwrap().stock.credits - 1000.0).abs() < f64::EPSILON);
    }
}
