//! # Snapshot Builder
//!
//! Turns world state into the self-describing [`Value`] tree that
//! crosses the wire: a map keyed by decimal entity id, each entry a map
//! keyed by component name. Field names match the persistence layer's
//! table names so client tooling sees one vocabulary everywhere.

use vela_core::{Component, EntityId, Position, Resources, WorldStore};

use crate::protocol::Value;

/// Builds a snapshot tree for the listed entities.
#[must_use]
pub fn world_snapshot(world: &WorldStore, entities: &[EntityId]) -> Value {
    Value::map(entities.iter().map(|entity| {
        (entity.raw().to_string(), entity_snapshot(world, *entity))
    }))
}

/// Builds one entity's component map.
#[must_use]
pub fn entity_snapshot(world: &WorldStore, entity: EntityId) -> Value {
    Value::map(
        world
            .components_of(entity)
            .iter()
            .map(|c| (c.kind().table_name().to_owned(), component_value(c))),
    )
}

/// Reads the position out of an entity's snapshot map, if present.
#[must_use]
pub fn snapshot_position(entity_value: &Value) -> Option<Position> {
    let position = entity_value.get("position")?;
    Some(Position::new(
        position.get("x")?.as_f64()?,
        position.get("y")?.as_f64()?,
        position.get("z")?.as_f64()?,
    ))
}

fn position_value(p: Position) -> Value {
    Value::map([
        ("x".to_owned(), Value::F64(p.x)),
        ("y".to_owned(), Value::F64(p.y)),
        ("z".to_owned(), Value::F64(p.z)),
    ])
}

fn resources_value(r: Resources) -> Value {
    Value::map([
        ("metal".to_owned(), Value::F64(r.metal)),
        ("energy".to_owned(), Value::F64(r.energy)),
        ("credits".to_owned(), Value::F64(r.credits)),
    ])
}

fn entity_ref_value(e: Option<EntityId>) -> Value {
    match e {
        #[allow(clippy::cast_possible_wrap)]
        Some(id) => Value::I64(id.raw() as i64),
        None => Value::Null,
    }
}

/// Encodes one component as a field map.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn component_value(component: &Component) -> Value {
    match component {
        Component::Position(p) => position_value(*p),
        Component::Velocity(v) => Value::map([
            ("vx".to_owned(), Value::F64(v.vx)),
            ("vy".to_owned(), Value::F64(v.vy)),
            ("vz".to_owned(), Value::F64(v.vz)),
        ]),
        Component::Rotation(r) => Value::map([("yaw".to_owned(), Value::F64(r.yaw))]),
        Component::Economy(e) => Value::map([
            ("stock".to_owned(), resources_value(e.stock)),
            ("production".to_owned(), resources_value(e.production)),
        ]),
        Component::Building(b) => Value::map([
            ("kind".to_owned(), Value::Str(format!("{:?}", b.kind))),
            ("level".to_owned(), Value::I64(i64::from(b.level))),
            ("active".to_owned(), Value::Bool(b.active)),
        ]),
        Component::ProductionChain(c) => Value::map([
            (
                "inputs".to_owned(),
                Value::List(c.inputs.iter().map(rate_value).collect()),
            ),
            (
                "outputs".to_owned(),
                Value::List(c.outputs.iter().map(rate_value).collect()),
            ),
            ("status".to_owned(), Value::Str(format!("{:?}", c.status))),
        ]),
        Component::Combat(c) => Value::map([
            ("hp".to_owned(), Value::F64(c.hp)),
            ("max_hp".to_owned(), Value::F64(c.max_hp)),
            ("firepower".to_owned(), Value::F64(c.firepower)),
            ("target".to_owned(), entity_ref_value(c.target)),
            ("fire_rate".to_owned(), Value::F64(c.fire_rate)),
        ]),
        Component::ShieldArc(s) => Value::map([
            ("strength".to_owned(), Value::F64(s.strength)),
            ("max_strength".to_owned(), Value::F64(s.max_strength)),
            ("facing".to_owned(), Value::F64(s.facing)),
            ("arc".to_owned(), Value::F64(s.arc)),
        ]),
        Component::Cargo(c) => Value::map([
            ("inventory".to_owned(), resources_value(c.inventory)),
            ("capacity".to_owned(), Value::F64(c.capacity)),
            ("origin".to_owned(), entity_ref_value(c.origin)),
            ("target".to_owned(), entity_ref_value(c.target)),
            ("status".to_owned(), Value::Str(format!("{:?}", c.status))),
        ]),
        Component::Logistics(l) => Value::map([(
            "transfers".to_owned(),
            Value::List(
                l.transfers
                    .iter()
                    .map(|t| {
                        Value::map([
                            (
                                "resource".to_owned(),
                                Value::Str(format!("{:?}", t.resource)),
                            ),
                            ("amount".to_owned(), Value::F64(t.amount)),
                            ("target".to_owned(), entity_ref_value(Some(t.target))),
                        ])
                    })
                    .collect(),
            ),
        )]),
        Component::Sovereignty(s) => Value::map([
            ("owner".to_owned(), entity_ref_value(s.owner)),
            ("influence".to_owned(), Value::F64(s.influence)),
            ("tax_rate".to_owned(), Value::F64(s.tax_rate)),
        ]),
        Component::Corporation(c) => {
            Value::map([("treasury".to_owned(), Value::F64(c.treasury))])
        }
        Component::Identity(i) => Value::map([("owner".to_owned(), entity_ref_value(i.owner))]),
        Component::Fleet(f) => Value::map([
            (
                "members".to_owned(),
                Value::List(
                    f.members
                        .iter()
                        .map(|m| entity_ref_value(Some(*m)))
                        .collect(),
                ),
            ),
            (
                "formation".to_owned(),
                Value::Str(format!("{:?}", f.formation)),
            ),
            ("jumping".to_owned(), Value::Bool(f.jumping)),
            ("jump_progress".to_owned(), Value::F64(f.jump_progress)),
            (
                "destination".to_owned(),
                f.destination.map_or(Value::Null, position_value),
            ),
        ]),
    }
}

fn rate_value((resource, rate): &(vela_core::ResourceKind, f64)) -> Value {
    Value::map([
        ("resource".to_owned(), Value::Str(format!("{resource:?}"))),
        ("rate".to_owned(), Value::F64(*rate)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{Combat, Economy};

    #[test]
    fn test_snapshot_keys_are_entity_ids() {
        let mut world = WorldStore::new();
        let a = world.create_entity();
        world.add_component(a, Component::Position(Position::new(1.0, 2.0, 3.0)));
        let b = world.create_entity();
        world.add_component(b, Component::Economy(Economy::default()));

        let snapshot = world_snapshot(&world, &[a, b]);
        assert!(snapshot.get(&a.raw().to_string()).is_some());
        assert!(snapshot.get(&b.raw().to_string()).is_some());
    }

    #[test]
    fn test_position_round_trip_through_value() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        let pos = Position::new(-4.5, 0.0, 12.0);
        world.add_component(e, Component::Position(pos));

        let entity_value = entity_snapshot(&world, e);
        assert_eq!(snapshot_position(&entity_value), Some(pos));
    }

    #[test]
    fn test_entity_without_position_has_none() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(
            e,
            Component::Combat(Combat {
                hp: 10.0,
                max_hp: 10.0,
                firepower: 1.0,
                target: None,
                fire_rate: 1.0,
                last_fire_at: 0.0,
            }),
        );

        let entity_value = entity_snapshot(&world, e);
        assert_eq!(snapshot_position(&entity_value), None);
        assert!(entity_value.get("combat").is_some());
    }
}
