//! # Component Union
//!
//! Components are pure data records attached to entities. The set of kinds
//! is closed: one enum variant per kind, one bitmask bit per kind.
//!
//! All component payloads are plain serializable data so the persistence
//! layer can write them as one normalized row per kind.

use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// The closed set of component kinds.
///
/// Each kind owns exactly one bit in an entity's bitmask:
/// `mask(e) & kind.bit() != 0` if and only if `e` carries that component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComponentKind {
    /// 3D position in world space.
    Position = 0,
    /// Movement in world units per second.
    Velocity = 1,
    /// Yaw facing in the XZ plane.
    Rotation = 2,
    /// Resource stocks and per-tick production accumulator.
    Economy = 3,
    /// A production structure with a static per-level yield.
    Building = 4,
    /// Declared input/output production chain.
    ProductionChain = 5,
    /// Hit points, firepower, targeting and fire-rate state.
    Combat = 6,
    /// Directional shield wedge absorbing damage inside its arc.
    ShieldArc = 7,
    /// Mobile freight: inventory travelling toward a target entity.
    Cargo = 8,
    /// A hub queuing abstract resource transfers.
    Logistics = 9,
    /// Territorial claim: owner, influence, tax rate.
    Sovereignty = 10,
    /// A corporation with a treasury collecting sovereignty taxes.
    Corporation = 11,
    /// Who owns this entity.
    Identity = 12,
    /// Formation-flying member group with jump-drive state.
    Fleet = 13,
}

/// Number of component kinds; sizes the per-kind storage table.
pub const KIND_COUNT: usize = 14;

/// All component kinds in discriminant order.
pub const ALL_KINDS: [ComponentKind; KIND_COUNT] = [
    ComponentKind::Position,
    ComponentKind::Velocity,
    ComponentKind::Rotation,
    ComponentKind::Economy,
    ComponentKind::Building,
    ComponentKind::ProductionChain,
    ComponentKind::Combat,
    ComponentKind::ShieldArc,
    ComponentKind::Cargo,
    ComponentKind::Logistics,
    ComponentKind::Sovereignty,
    ComponentKind::Corporation,
    ComponentKind::Identity,
    ComponentKind::Fleet,
];

impl ComponentKind {
    /// The bitmask bit owned by this kind.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1 << (self as u8)
    }

    /// Combines a set of kinds into a single query mask.
    #[must_use]
    pub fn mask(kinds: &[Self]) -> u64 {
        kinds.iter().fold(0, |m, k| m | k.bit())
    }

    /// Stable name used as the durable table name for this kind.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Rotation => "rotation",
            Self::Economy => "economy",
            Self::Building => "building",
            Self::ProductionChain => "production_chain",
            Self::Combat => "combat",
            Self::ShieldArc => "shield_arc",
            Self::Cargo => "cargo",
            Self::Logistics => "logistics",
            Self::Sovereignty => "sovereignty",
            Self::Corporation => "corporation",
            Self::Identity => "identity",
            Self::Fleet => "fleet",
        }
    }
}

/// 3D position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Movement in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// X velocity.
    pub vx: f64,
    /// Y velocity.
    pub vy: f64,
    /// Z velocity.
    pub vz: f64,
}

/// Yaw facing in radians, XZ plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Yaw in radians.
    pub yaw: f64,
}

/// The closed set of tradable resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Raw construction material.
    Metal,
    /// Power for chains and structures.
    Energy,
    /// Currency.
    Credits,
}

/// A fixed record of resource amounts, one slot per [`ResourceKind`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Metal amount.
    pub metal: f64,
    /// Energy amount.
    pub energy: f64,
    /// Credits amount.
    pub credits: f64,
}

impl Resources {
    /// Creates a resource record.
    #[inline]
    #[must_use]
    pub const fn new(metal: f64, energy: f64, credits: f64) -> Self {
        Self {
            metal,
            energy,
            credits,
        }
    }

    /// Returns the amount of one resource.
    #[inline]
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Metal => self.metal,
            ResourceKind::Energy => self.energy,
            ResourceKind::Credits => self.credits,
        }
    }

    /// Adds `amount` of one resource (negative amounts debit).
    #[inline]
    pub fn add(&mut self, kind: ResourceKind, amount: f64) {
        match kind {
            ResourceKind::Metal => self.metal += amount,
            ResourceKind::Energy => self.energy += amount,
            ResourceKind::Credits => self.credits += amount,
        }
    }

    /// Resets every slot to zero.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Resource stocks plus the per-tick production accumulator.
///
/// `production` is zeroed at the start of every Economy pass, filled by
/// buildings and chains, then folded into `stock` pro-rated by elapsed
/// time. Production values are rates (units per second), not per-tick
/// amounts, so variable tick durations stay correct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Economy {
    /// Durable resource stock.
    pub stock: Resources,
    /// Production rates accumulated this tick (units per second).
    pub production: Resources,
}

impl Economy {
    /// Creates an economy with the given starting stock.
    #[must_use]
    pub const fn with_stock(metal: f64, energy: f64, credits: f64) -> Self {
        Self {
            stock: Resources::new(metal, energy, credits),
            production: Resources::new(0.0, 0.0, 0.0),
        }
    }
}

/// Legacy building families with a static per-level yield table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Produces metal: 10 per level per second.
    Mine,
    /// Produces energy: 15 per level per second.
    Generator,
    /// Produces credits: 5 per level per second.
    Habitat,
}

/// A production structure.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Which yield family this building belongs to.
    pub kind: BuildingKind,
    /// Upgrade level, scales the yield linearly.
    pub level: u32,
    /// Inactive buildings are skipped entirely.
    pub active: bool,
}

/// Lifecycle status of a production chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    /// Not yet evaluated this session.
    #[default]
    Idle,
    /// All inputs available; outputs credited this tick.
    Producing,
    /// At least one input was short; nothing consumed or produced.
    StalledInput,
}

/// A declared input/output production chain.
///
/// Rates are units per second. The chain only runs when *every* input can
/// cover `rate * dt`; a short input stalls the whole chain with no partial
/// consumption (resource shortage is status, not an error).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionChain {
    /// Required inputs as (resource, rate) pairs.
    pub inputs: Vec<(ResourceKind, f64)>,
    /// Produced outputs as (resource, rate) pairs.
    pub outputs: Vec<(ResourceKind, f64)>,
    /// Last evaluated status.
    pub status: ChainStatus,
}

/// Hit points, firepower and targeting state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Combat {
    /// Current hit points.
    pub hp: f64,
    /// Maximum hit points.
    pub max_hp: f64,
    /// Damage dealt per shot.
    pub firepower: f64,
    /// Current target, if any.
    pub target: Option<EntityId>,
    /// Minimum seconds between shots.
    pub fire_rate: f64,
    /// Simulation time of the last shot, in seconds.
    pub last_fire_at: f64,
}

impl Combat {
    /// Default combat block given to targeted cargo without one.
    #[must_use]
    pub const fn cargo_default() -> Self {
        Self {
            hp: 50.0,
            max_hp: 50.0,
            firepower: 0.0,
            target: None,
            fire_rate: 1.0,
            last_fire_at: 0.0,
        }
    }
}

/// Directional shield wedge.
///
/// Absorbs incoming damage when the attacker bearing (relative to the
/// defender facing) falls inside the arc half-width, up to the remaining
/// strength; spillover hits the hull.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShieldArc {
    /// Remaining absorption.
    pub strength: f64,
    /// Maximum absorption.
    pub max_strength: f64,
    /// Arc center, radians relative to entity facing.
    pub facing: f64,
    /// Full arc width in radians.
    pub arc: f64,
}

/// Travel state of a cargo entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CargoStatus {
    /// Spawned, not yet moving.
    #[default]
    Loading,
    /// Advancing toward the target.
    Traveling,
    /// Arrived; inventory being emptied into the target.
    Unloading,
}

/// Mobile freight entity payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cargo {
    /// Carried resources.
    pub inventory: Resources,
    /// Maximum carriable amount.
    pub capacity: f64,
    /// Hub that spawned this cargo.
    pub origin: Option<EntityId>,
    /// Destination entity.
    pub target: Option<EntityId>,
    /// Travel state.
    pub status: CargoStatus,
}

/// One queued abstract transfer on a logistics hub.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// Resource to move.
    pub resource: ResourceKind,
    /// Amount to move.
    pub amount: f64,
    /// Receiving entity.
    pub target: EntityId,
}

/// A hub queuing abstract resource transfers.
///
/// The Logistics system drains this queue into concrete cargo entities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Logistics {
    /// Pending transfer requests.
    pub transfers: Vec<Transfer>,
}

/// Territorial claim over an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sovereignty {
    /// Controlling corporation entity, if claimed.
    pub owner: Option<EntityId>,
    /// Claim strength, grows toward [`Sovereignty::INFLUENCE_CAP`].
    pub influence: f64,
    /// Fraction of credit production taxed away under foreign control.
    pub tax_rate: f64,
}

impl Sovereignty {
    /// Influence ceiling.
    pub const INFLUENCE_CAP: f64 = 100.0;
    /// Influence growth per second while owned.
    pub const INFLUENCE_RATE: f64 = 2.0;
}

/// A corporation treasury.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Corporation {
    /// Accumulated credits.
    pub treasury: f64,
}

/// Ownership record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Owning corporation entity, if any.
    pub owner: Option<EntityId>,
}

/// Fleet formation layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formation {
    /// Members evenly spaced on a circle around the flagship.
    #[default]
    Circle,
    /// Members on a line abreast.
    Line,
    /// Members in a triangular wedge.
    Delta,
}

/// Formation-flying member group with jump-drive state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    /// Member entities, in formation-slot order.
    pub members: Vec<EntityId>,
    /// Active formation layout.
    pub formation: Formation,
    /// Whether a jump is in progress.
    pub jumping: bool,
    /// Jump completion in [0, 1].
    pub jump_progress: f64,
    /// Jump destination; cleared on arrival.
    pub destination: Option<Position>,
}

/// A component value: the closed tagged union over all kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Component {
    /// See [`Position`].
    Position(Position),
    /// See [`Velocity`].
    Velocity(Velocity),
    /// See [`Rotation`].
    Rotation(Rotation),
    /// See [`Economy`].
    Economy(Economy),
    /// See [`Building`].
    Building(Building),
    /// See [`ProductionChain`].
    ProductionChain(ProductionChain),
    /// See [`Combat`].
    Combat(Combat),
    /// See [`ShieldArc`].
    ShieldArc(ShieldArc),
    /// See [`Cargo`].
    Cargo(Cargo),
    /// See [`Logistics`].
    Logistics(Logistics),
    /// See [`Sovereignty`].
    Sovereignty(Sovereignty),
    /// See [`Corporation`].
    Corporation(Corporation),
    /// See [`Identity`].
    Identity(Identity),
    /// See [`Fleet`].
    Fleet(Fleet),
}

impl Component {
    /// The kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        match self {
            Self::Position(_) => ComponentKind::Position,
            Self::Velocity(_) => ComponentKind::Velocity,
            Self::Rotation(_) => ComponentKind::Rotation,
            Self::Economy(_) => ComponentKind::Economy,
            Self::Building(_) => ComponentKind::Building,
            Self::ProductionChain(_) => ComponentKind::ProductionChain,
            Self::Combat(_) => ComponentKind::Combat,
            Self::ShieldArc(_) => ComponentKind::ShieldArc,
            Self::Cargo(_) => ComponentKind::Cargo,
            Self::Logistics(_) => ComponentKind::Logistics,
            Self::Sovereignty(_) => ComponentKind::Sovereignty,
            Self::Corporation(_) => ComponentKind::Corporation,
            Self::Identity(_) => ComponentKind::Identity,
            Self::Fleet(_) => ComponentKind::Fleet,
        }
    }
}
