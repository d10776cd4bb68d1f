//! # Commands
//!
//! Every mutation a client may request is a [`Command`]. The server
//! validates and applies them before the systems run; clients apply the
//! same mutations speculatively and reconcile against the authority.
//!
//! A rejected command never aborts the tick: validation failure is an
//! error *for that command*, reported back over its command id.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vela_core::{
    Building, BuildingKind, Component, ComponentKind, EntityId, Position, ResourceKind, Transfer,
    WorldStore,
};

/// A client-issued world mutation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Start a jump moving the fleet (and its members) to `destination`.
    MoveFleet {
        /// Fleet entity to move.
        fleet: EntityId,
        /// Jump destination.
        destination: Position,
    },
    /// Construct (or upgrade) a building on an economy entity.
    BuildBuilding {
        /// Entity to build on.
        site: EntityId,
        /// Building family.
        kind: BuildingKind,
        /// Target level.
        level: u32,
    },
    /// Queue a resource transfer from a logistics hub to another entity.
    TransferResources {
        /// Hub the resources leave from.
        from: EntityId,
        /// Receiving entity.
        to: EntityId,
        /// Resource to move.
        resource: ResourceKind,
        /// Amount to move.
        amount: f64,
    },
}

/// Why a command was rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CommandError {
    /// Referenced entity does not exist.
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),

    /// Entity exists but lacks a required component.
    #[error("entity {entity} has no {required:?} component")]
    MissingCapability {
        /// The entity that was checked.
        entity: EntityId,
        /// The component kind it needed.
        required: ComponentKind,
    },

    /// Stock cannot cover the requested cost.
    #[error("insufficient {resource:?}: need {needed}, have {available}")]
    InsufficientResources {
        /// Resource that was short.
        resource: ResourceKind,
        /// Amount required.
        needed: f64,
        /// Amount available.
        available: f64,
    },

    /// A quantity that must be strictly positive was not.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(f64),
}

/// Metal cost per building level.
const BUILD_METAL_PER_LEVEL: f64 = 100.0;
/// Energy cost per building level.
const BUILD_ENERGY_PER_LEVEL: f64 = 50.0;

/// Validates and applies one command against the world.
///
/// # Errors
///
/// Returns a [`CommandError`] and leaves the world untouched when the
/// command fails validation.
pub fn apply_command(world: &mut WorldStore, command: &Command) -> Result<(), CommandError> {
    match *command {
        Command::MoveFleet { fleet, destination } => move_fleet(world, fleet, destination),
        Command::BuildBuilding { site, kind, level } => build_building(world, site, kind, level),
        Command::TransferResources {
            from,
            to,
            resource,
            amount,
        } => transfer_resources(world, from, to, resource, amount),
    }
}

fn require_alive(world: &WorldStore, entity: EntityId) -> Result<(), CommandError> {
    if world.is_alive(entity) {
        Ok(())
    } else {
        Err(CommandError::UnknownEntity(entity))
    }
}

fn require_component(
    world: &WorldStore,
    entity: EntityId,
    required: ComponentKind,
) -> Result<(), CommandError> {
    if world.has(entity, required) {
        Ok(())
    } else {
        Err(CommandError::MissingCapability { entity, required })
    }
}

fn move_fleet(
    world: &mut WorldStore,
    fleet: EntityId,
    destination: Position,
) -> Result<(), CommandError> {
    require_alive(world, fleet)?;
    require_component(world, fleet, ComponentKind::Fleet)?;
    require_component(world, fleet, ComponentKind::Position)?;

    if let Some(fleet_data) = world.fleet_mut(fleet) {
        fleet_data.destination = Some(destination);
        fleet_data.jumping = true;
        fleet_data.jump_progress = 0.0;
    }
    Ok(())
}

fn build_building(
    world: &mut WorldStore,
    site: EntityId,
    kind: BuildingKind,
    level: u32,
) -> Result<(), CommandError> {
    if level == 0 {
        return Err(CommandError::InvalidAmount(0.0));
    }
    require_alive(world, site)?;
    require_component(world, site, ComponentKind::Economy)?;

    let metal_cost = BUILD_METAL_PER_LEVEL * f64::from(level);
    let energy_cost = BUILD_ENERGY_PER_LEVEL * f64::from(level);

    let Some(economy) = world.economy(site) else {
        return Err(CommandError::MissingCapability {
            entity: site,
            required: ComponentKind::Economy,
        });
    };
    if economy.stock.metal < metal_cost {
        return Err(CommandError::InsufficientResources {
            resource: ResourceKind::Metal,
            needed: metal_cost,
            available: economy.stock.metal,
        });
    }
    if economy.stock.energy < energy_cost {
        return Err(CommandError::InsufficientResources {
            resource: ResourceKind::Energy,
            needed: energy_cost,
            available: economy.stock.energy,
        });
    }

    if let Some(economy) = world.economy_mut(site) {
        economy.stock.metal -= metal_cost;
        economy.stock.energy -= energy_cost;
    }
    world.add_component(
        site,
        Component::Building(Building {
            kind,
            level,
            active: true,
        }),
    );
    Ok(())
}

fn transfer_resources(
    world: &mut WorldStore,
    from: EntityId,
    to: EntityId,
    resource: ResourceKind,
    amount: f64,
) -> Result<(), CommandError> {
    if amount <= 0.0 || !amount.is_finite() {
        return Err(CommandError::InvalidAmount(amount));
    }
    require_alive(world, from)?;
    require_alive(world, to)?;
    require_component(world, from, ComponentKind::Logistics)?;
    require_component(world, from, ComponentKind::Economy)?;

    let Some(economy) = world.economy(from) else {
        return Err(CommandError::MissingCapability {
            entity: from,
            required: ComponentKind::Economy,
        });
    };
    let available = economy.stock.get(resource);
    if available < amount {
        return Err(CommandError::InsufficientResources {
            resource,
            needed: amount,
            available,
        });
    }

    if let Some(economy) = world.economy_mut(from) {
        economy.stock.add(resource, -amount);
    }
    if let Some(logistics) = world.logistics_mut(from) {
        logistics.transfers.push(Transfer {
            resource,
            amount,
            target: to,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{Economy, Fleet, Logistics};

    fn hub(world: &mut WorldStore, metal: f64) -> EntityId {
        let e = world.create_entity();
        world.add_component(e, Component::Position(Position::default()));
        world.add_component(e, Component::Economy(Economy::with_stock(metal, 500.0, 0.0)));
        world.add_component(e, Component::Logistics(Logistics::default()));
        e
    }

    #[test]
    fn test_move_fleet_starts_jump() {
        let mut world = WorldStore::new();
        let fleet = world.create_entity();
        world.add_component(fleet, Component::Position(Position::default()));
        world.add_component(fleet, Component::Fleet(Fleet::default()));

        let dest = Position::new(10.0, 0.0, 10.0);
        apply_command(
            &mut world,
            &Command::MoveFleet {
                fleet,
                destination: dest,
            },
        )
        .unwrap();

        let data = world.fleet(fleet).unwrap();
        assert!(data.jumping);
        assert_eq!(data.destination, Some(dest));
    }

    #[test]
    fn test_move_fleet_rejects_non_fleet() {
        let mut world = WorldStore::new();
        let e = world.create_entity();
        world.add_component(e, Component::Position(Position::default()));

        let err = apply_command(
            &mut world,
            &Command::MoveFleet {
                fleet: e,
                destination: Position::default(),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingCapability {
                entity: e,
                required: ComponentKind::Fleet
            }
        );
    }

    #[test]
    fn test_build_debits_stock() {
        let mut world = WorldStore::new();
        let site = hub(&mut world, 500.0);

        apply_command(
            &mut world,
            &Command::BuildBuilding {
                site,
                kind: BuildingKind::Mine,
                level: 2,
            },
        )
        .unwrap();

        let economy = world.economy(site).unwrap();
        assert!((economy.stock.metal - 300.0).abs() < f64::EPSILON);
        assert!((economy.stock.energy - 400.0).abs() < f64::EPSILON);
        assert_eq!(world.building(site).unwrap().level, 2);
    }

    #[test]
    fn test_build_rejects_short_stock_without_mutation() {
        let mut world = WorldStore::new();
        let site = hub(&mut world, 50.0);

        let err = apply_command(
            &mut world,
            &Command::BuildBuilding {
                site,
                kind: BuildingKind::Mine,
                level: 1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InsufficientResources { .. }));
        assert!((world.economy(site).unwrap().stock.metal - 50.0).abs() < f64::EPSILON);
        assert!(world.building(site).is_none());
    }

    #[test]
    fn test_transfer_queues_and_debits() {
        let mut world = WorldStore::new();
        let from = hub(&mut world, 200.0);
        let to = world.create_entity();
        world.add_component(to, Component::Economy(Economy::default()));

        apply_command(
            &mut world,
            &Command::TransferResources {
                from,
                to,
                resource: ResourceKind::Metal,
                amount: 80.0,
            },
        )
        .unwrap();

        assert!((world.economy(from).unwrap().stock.metal - 120.0).abs() < f64::EPSILON);
        let queued = &world.logistics(from).unwrap().transfers;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].target, to);
    }

    #[test]
    fn test_transfer_rejects_bad_amount() {
        let mut world = WorldStore::new();
        let from = hub(&mut world, 200.0);
        let to = world.create_entity();

        let err = apply_command(
            &mut world,
            &Command::TransferResources {
                from,
                to,
                resource: ResourceKind::Metal,
                amount: -1.0,
            },
        )
        .unwrap_err();
        assert_eq!(err, CommandError::InvalidAmount(-1.0));
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let mut world = WorldStore::new();
        let err = apply_command(
            &mut world,
            &Command::MoveFleet {
                fleet: EntityId(99),
                destination: Position::default(),
            },
        )
        .unwrap_err();
        assert_eq!(err, CommandError::UnknownEntity(EntityId(99)));
    }
}
