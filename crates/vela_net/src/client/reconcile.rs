//! # State Reconciliation
//!
//! Compares the locally predicted world against an authoritative
//! snapshot and turns disagreements into corrections.
//!
//! - position deviation past the threshold becomes a move correction
//!   (high severity past a larger threshold)
//! - an entity the authority knows and we don't is always high severity
//!   (create); one we know and it doesn't, likewise (remove)
//!
//! Corrections apply either as a hard overwrite or, when enabled, as a
//! bounded eased transition so the camera never sees a teleport.

use std::collections::{BTreeSet, HashMap, VecDeque};

use vela_core::{Component, EntityId, Position, WorldStore};

use crate::protocol::Value;
use crate::snapshot::snapshot_position;

/// Default deviation threshold in world units.
pub const DEFAULT_DEVIATION_THRESHOLD: f64 = 0.1;
/// Deviations past this are high severity.
const HIGH_SEVERITY_DISTANCE: f64 = 1.0;
/// Default eased transition length, milliseconds.
pub const DEFAULT_BLEND_MS: f64 = 500.0;
/// Correction history bound.
const HISTORY_LIMIT: usize = 64;

/// How urgent a correction is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Small numeric drift.
    Low,
    /// Structural disagreement or large drift.
    High,
}

/// One disagreement with the authority.
#[derive(Clone, Debug, PartialEq)]
pub enum Correction {
    /// The authority knows this entity and we do not: create it.
    Create {
        /// Entity to create.
        entity: EntityId,
        /// Authoritative position, when the snapshot carries one.
        position: Option<Position>,
    },
    /// We know this entity and the authority does not: remove it.
    Remove {
        /// Entity to remove.
        entity: EntityId,
    },
    /// Positions disagree beyond the threshold.
    Move {
        /// Drifted entity.
        entity: EntityId,
        /// Our predicted position.
        local: Position,
        /// The authority's position.
        authoritative: Position,
        /// Euclidean drift distance.
        distance: f64,
        /// Low or high.
        severity: Severity,
    },
}

/// Cumulative reconciliation statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconcileStats {
    /// Snapshots reconciled.
    pub snapshots: u64,
    /// Corrections produced.
    pub corrections: u64,
    /// Largest position drift observed.
    pub max_deviation: f64,
}

struct Transition {
    from: Position,
    to: Position,
    started_at_ms: f64,
}

/// Deviation detector and correction applier.
pub struct StateReconciler {
    deviation_threshold: f64,
    blend_ms: f64,
    /// Eased transitions in flight, keyed by entity.
    transitions: HashMap<EntityId, Transition>,
    history: VecDeque<Correction>,
    stats: ReconcileStats,
}

impl StateReconciler {
    /// Creates a reconciler.
    ///
    /// `blend_ms` of zero disables easing: every correction is a hard
    /// overwrite.
    #[must_use]
    pub fn new(deviation_threshold: f64, blend_ms: f64) -> Self {
        Self {
            deviation_threshold,
            blend_ms,
            transitions: HashMap::new(),
            history: VecDeque::new(),
            stats: ReconcileStats::default(),
        }
    }

    /// Diffs the local world against an authoritative snapshot tree
    /// (entity-id-keyed map) and returns the needed corrections.
    pub fn reconcile(&mut self, world: &WorldStore, authority: &Value) -> Vec<Correction> {
        self.stats.snapshots += 1;
        let mut corrections = Vec::new();

        let Value::Map(entities) = authority else {
            tracing::warn!("authoritative snapshot is not an entity map");
            return corrections;
        };

        let mut authoritative_ids = BTreeSet::new();
        for (key, entity_value) in entities {
            let Ok(raw) = key.parse::<u64>() else {
                tracing::warn!(key, "non-numeric entity key in snapshot");
                continue;
            };
            let entity = EntityId(raw);
            authoritative_ids.insert(entity);

            if !world.is_alive(entity) {
                corrections.push(Correction::Create {
                    entity,
                    position: snapshot_position(entity_value),
                });
                continue;
            }

            let (Some(local), Some(authoritative)) = (
                world.position(entity).copied(),
                snapshot_position(entity_value),
            ) else {
                continue;
            };

            let distance = local.distance(authoritative);
            self.stats.max_deviation = self.stats.max_deviation.max(distance);
            if distance > self.deviation_threshold {
                let severity = if distance > HIGH_SEVERITY_DISTANCE {
                    Severity::High
                } else {
                    Severity::Low
                };
                corrections.push(Correction::Move {
                    entity,
                    local,
                    authoritative,
                    distance,
                    severity,
                });
            }
        }

        for entity in world.entities() {
            if !authoritative_ids.contains(&entity) {
                corrections.push(Correction::Remove { entity });
            }
        }

        self.stats.corrections += corrections.len() as u64;
        for correction in &corrections {
            if self.history.len() >= HISTORY_LIMIT {
                self.history.pop_front();
            }
            self.history.push_back(correction.clone());
        }
        corrections
    }

    /// Applies corrections to the local world.
    ///
    /// Creates and removals are structural and always immediate. Moves
    /// ease over the blend window unless easing is disabled.
    pub fn apply(&mut self, world: &mut WorldStore, corrections: &[Correction], now_ms: f64) {
        for correction in corrections {
            match *correction {
                Correction::Create { entity, position } => {
                    world.create_entity_with_id(entity);
                    if let Some(position) = position {
                        world.add_component(entity, Component::Position(position));
                    }
                }
                Correction::Remove { entity } => {
                    self.transitions.remove(&entity);
                    world.destroy_entity(entity);
                }
                Correction::Move {
                    entity,
                    local,
                    authoritative,
                    ..
                } => {
                    if self.blend_ms > 0.0 {
                        self.transitions.insert(
                            entity,
                            Transition {
                                from: local,
                                to: authoritative,
                                started_at_ms: now_ms,
                            },
                        );
                    } else if let Some(pos) = world.position_mut(entity) {
                        *pos = authoritative;
                    }
                }
            }
        }
    }

    /// Advances eased transitions; call every client frame.
    pub fn update(&mut self, world: &mut WorldStore, now_ms: f64) {
        let blend = self.blend_ms;
        self.transitions.retain(|entity, transition| {
            let t = ((now_ms - transition.started_at_ms) / blend).clamp(0.0, 1.0);
            let eased = ease_in_out(t);
            if let Some(pos) = world.position_mut(*entity) {
                pos.x = transition.from.x + (transition.to.x - transition.from.x) * eased;
                pos.y = transition.from.y + (transition.to.y - transition.from.y) * eased;
                pos.z = transition.from.z + (transition.to.z - transition.from.z) * eased;
            }
            t < 1.0
        });
    }

    /// Recent corrections, oldest first.
    #[must_use]
    pub fn history(&self) -> impl Iterator<Item = &Correction> {
        self.history.iter()
    }

    /// Cumulative statistics.
    #[must_use]
    pub const fn stats(&self) -> &ReconcileStats {
        &self.stats
    }
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_DEVIATION_THRESHOLD, DEFAULT_BLEND_MS)
    }
}

/// Quadratic ease-in-out on [0, 1].
fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        (4.0 - 2.0 * t) * t - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::world_snapshot;

    fn world_with(positions: &[(u64, f64)]) -> WorldStore {
        let mut world = WorldStore::new();
        for (id, x) in positions {
            let e = world.create_entity_with_id(EntityId(*id));
            world.add_component(e, Component::Position(Position::new(*x, 0.0, 0.0)));
        }
        world
    }

    fn authority_of(world: &WorldStore) -> Value {
        let entities: Vec<EntityId> = world.entities().collect();
        world_snapshot(world, &entities)
    }

    #[test]
    fn test_agreement_produces_no_corrections() {
        let local = world_with(&[(1, 5.0)]);
        let authority = authority_of(&world_with(&[(1, 5.0)]));

        let mut reconciler = StateReconciler::default();
        assert!(reconciler.reconcile(&local, &authority).is_empty());
    }

    #[test]
    fn test_small_drift_below_threshold_ignored() {
        let local = world_with(&[(1, 5.0)]);
        let authority = authority_of(&world_with(&[(1, 5.05)]));

        let mut reconciler = StateReconciler::default();
        assert!(reconciler.reconcile(&local, &authority).is_empty());
    }

    #[test]
    fn test_drift_severity_thresholds() {
        let local = world_with(&[(1, 0.0)]);
        let mut reconciler = StateReconciler::default();

        let small = reconciler.reconcile(&local, &authority_of(&world_with(&[(1, 0.5)])));
        assert!(matches!(
            small.as_slice(),
            [Correction::Move {
                severity: Severity::Low,
                ..
            }]
        ));

        let large = reconciler.reconcile(&local, &authority_of(&world_with(&[(1, 10.0)])));
        assert!(matches!(
            large.as_slice(),
            [Correction::Move {
                severity: Severity::High,
                ..
            }]
        ));
    }

    #[test]
    fn test_missing_and_extra_entities() {
        let local = world_with(&[(1, 0.0)]);
        let authority = authority_of(&world_with(&[(2, 3.0)]));

        let mut reconciler = StateReconciler::default();
        let corrections = reconciler.reconcile(&local, &authority);

        assert!(corrections.contains(&Correction::Create {
            entity: EntityId(2),
            position: Some(Position::new(3.0, 0.0, 0.0)),
        }));
        assert!(corrections.contains(&Correction::Remove {
            entity: EntityId(1)
        }));
    }

    #[test]
    fn test_hard_apply_overwrites_position() {
        let mut local = world_with(&[(1, 0.0)]);
        let authority = authority_of(&world_with(&[(1, 10.0)]));

        let mut reconciler = StateReconciler::new(DEFAULT_DEVIATION_THRESHOLD, 0.0);
        let corrections = reconciler.reconcile(&local, &authority);
        reconciler.apply(&mut local, &corrections, 0.0);

        assert!((local.position(EntityId(1)).unwrap().x - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eased_apply_converges_within_blend() {
        let mut local = world_with(&[(1, 0.0)]);
        let authority = authority_of(&world_with(&[(1, 10.0)]));

        let mut reconciler = StateReconciler::new(DEFAULT_DEVIATION_THRESHOLD, 500.0);
        let corrections = reconciler.reconcile(&local, &authority);
        reconciler.apply(&mut local, &corrections, 0.0);

        reconciler.update(&mut local, 250.0);
        let midway = local.position(EntityId(1)).unwrap().x;
        assert!(midway > 0.0 && midway < 10.0);

        reconciler.update(&mut local, 500.0);
        assert!((local.position(EntityId(1)).unwrap().x - 10.0).abs() < 1e-9);
        reconciler.update(&mut local, 600.0);
    }

    #[test]
    fn test_ease_in_out_shape() {
        assert!(ease_in_out(0.0).abs() < f64::EPSILON);
        assert!((ease_in_out(0.5) - 0.5).abs() < f64::EPSILON);
        assert!((ease_in_out(1.0) - 1.0).abs() < f64::EPSILON);
        // Slow start: far less than linear at t=0.1.
        assert!(ease_in_out(0.1) < 0.05);
    }
}
