//! # Combat System
//!
//! Target upkeep, fire-rate cooldown and directional shield resolution.
//!
//! ## Shield Arcs
//!
//! ```text
//!             facing
//!               │ arc/2
//!          ╲    │    ╱
//!           ╲   │   ╱      impact bearing inside the wedge:
//!            ╲  │  ╱       shield absorbs up to remaining strength,
//!             ╲ │ ╱        spillover hits the hull
//!              target
//! ```
//!
//! The impact bearing is `atan2(dx, dz)` in the XZ plane, taken relative
//! to the defender's yaw. Cooldowns are measured on the simulation clock
//! so replaying a command log reproduces every shot.

use vela_core::{Combat, Component, ComponentKind, EntityId, Position, WorldStore};

use crate::events::{EventQueue, SimEvent};
use crate::systems::System;

/// Targeting, cooldowns and damage resolution.
#[derive(Debug, Default)]
pub struct CombatSystem;

impl System for CombatSystem {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn run(&mut self, world: &mut WorldStore, _dt: f64, now: f64, events: &mut EventQueue) {
        let attackers = world.entities_with(&[ComponentKind::Combat, ComponentKind::Position]);

        for attacker in attackers {
            let Some(combat) = world.combat(attacker).copied() else {
                continue;
            };
            let Some(target) = combat.target else {
                continue;
            };
            let Some(attacker_pos) = world.position(attacker).copied() else {
                continue;
            };

            let target_pos = world.position(target).copied();
            let target_can_fight = world.has(target, ComponentKind::Combat);
            let target_is_cargo = world.has(target, ComponentKind::Cargo);

            // Target vanished or lost every targetable capability.
            let Some(target_pos) = target_pos else {
                clear_target(world, attacker);
                continue;
            };
            if !target_can_fight && !target_is_cargo {
                clear_target(world, attacker);
                continue;
            }

            // Cargo without combat gets the default hull before resolution.
            if target_is_cargo && !target_can_fight {
                world.add_component(target, Component::Combat(Combat::cargo_default()));
            }

            if world.combat(target).is_some_and(|c| c.hp <= 0.0) {
                clear_target(world, attacker);
                continue;
            }

            if now - combat.last_fire_at < combat.fire_rate {
                continue;
            }

            let hull_damage = resolve_shot(world, attacker, target, &combat, attacker_pos, target_pos);
            if let Some(c) = world.combat_mut(attacker) {
                c.last_fire_at = now;
            }
            events.push(SimEvent::WeaponFired {
                attacker,
                target,
                attacker_pos,
                target_pos,
                hull_damage,
            });
        }
    }
}

fn clear_target(world: &mut WorldStore, attacker: EntityId) {
    if let Some(combat) = world.combat_mut(attacker) {
        tracing::warn!(%attacker, target = ?combat.target, "dropping stale combat target");
        combat.target = None;
    }
}

/// Applies one shot, returning the damage that reached the hull.
fn resolve_shot(
    world: &mut WorldStore,
    _attacker: EntityId,
    target: EntityId,
    attacker_combat: &Combat,
    attacker_pos: Position,
    target_pos: Position,
) -> f64 {
    let mut damage = attacker_combat.firepower;

    // Impact bearing in the XZ plane, from the defender toward the attacker.
    let dx = attacker_pos.x - target_pos.x;
    let dz = attacker_pos.z - target_pos.z;
    let impact_angle = dx.atan2(dz);

    let shield = world.shield_arc(target).copied();
    if let Some(shield) = shield {
        if shield.strength > 0.0 {
            let target_yaw = world.rotation(target).map_or(0.0, |r| r.yaw);
            let relative = normalize_angle(impact_angle - target_yaw);

            let half_arc = shield.arc / 2.0;
            let offset = (relative - shield.facing).abs();
            let inside = offset <= half_arc || offset >= std::f64::consts::TAU - half_arc;

            if inside {
                let absorbed = shield.strength.min(damage);
                if let Some(shield) = world.shield_arc_mut(target) {
                    shield.strength -= absorbed;
                }
                damage -= absorbed;
            }
        }
    }

    if damage > 0.0 {
        if let Some(target_combat) = world.combat_mut(target) {
            target_combat.hp -= damage;
        }
    }
    damage
}

/// Wraps an angle into `[-PI, PI)`.
fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}
