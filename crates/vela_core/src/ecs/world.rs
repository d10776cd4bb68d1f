//! # World Store
//!
//! The central entity/component container with a memoized query cache.
//!
//! ## Query Cache
//!
//! ```text
//! entities_with([Position, Combat])
//!        │
//!        ▼  first call: one O(entities) scan, memoized per mask
//! queries[mask] = {e : mask(e) & mask == mask}
//!        │
//!        ▼  every later add/remove patches only the affected sets
//! incremental forever - never rebuilt wholesale
//! ```
//!
//! Entity sets are ordered collections so that iterating a query is
//! deterministic: replaying the same mutations produces identical results.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::component::{Component, ComponentKind, ALL_KINDS, KIND_COUNT};
use super::entity::EntityId;

/// Generates typed component accessors that unwrap one union variant.
macro_rules! typed_accessor {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        /// Typed read access to this entity's component, if present.
        #[must_use]
        pub fn $get(&self, entity: EntityId) -> Option<&$ty> {
            match self.get(entity, ComponentKind::$variant) {
                Some(Component::$variant(c)) => Some(c),
                _ => None,
            }
        }

        /// Typed mutable access to this entity's component, if present.
        pub fn $get_mut(&mut self, entity: EntityId) -> Option<&mut $ty> {
            match self.get_mut(entity, ComponentKind::$variant) {
                Some(Component::$variant(c)) => Some(c),
                _ => None,
            }
        }
    };
}

/// The authoritative entity/component data store.
pub struct WorldStore {
    /// Live entity set, ordered.
    entities: BTreeSet<EntityId>,
    /// Component bitmask per live entity.
    masks: BTreeMap<EntityId, u64>,
    /// One ordered store per component kind, indexed by discriminant.
    stores: Vec<BTreeMap<EntityId, Component>>,
    /// Memoized query sets keyed by target mask.
    queries: HashMap<u64, BTreeSet<EntityId>>,
    /// Next automatic entity id.
    next_id: u64,
    /// Entities destroyed since the last drain.
    destroyed: Vec<EntityId>,
    /// Entities created since the last drain.
    created: Vec<EntityId>,
}

impl WorldStore {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeSet::new(),
            masks: BTreeMap::new(),
            stores: (0..KIND_COUNT).map(|_| BTreeMap::new()).collect(),
            queries: HashMap::new(),
            next_id: 0,
            destroyed: Vec::new(),
            created: Vec::new(),
        }
    }

    /// Allocates the next entity id and adds it to the live set.
    pub fn create_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.insert_entity(id);
        id
    }

    /// Adds an entity with an explicit id.
    ///
    /// The allocator advances past the requested id so a later automatic
    /// allocation never collides with it.
    pub fn create_entity_with_id(&mut self, id: EntityId) -> EntityId {
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
        self.insert_entity(id);
        id
    }

    fn insert_entity(&mut self, id: EntityId) {
        self.entities.insert(id);
        self.masks.insert(id, 0);
        self.created.push(id);
    }

    /// Removes an entity, all its components, and its membership in every
    /// memoized query set.
    ///
    /// Cost is O(components + queries), independent of world size.
    pub fn destroy_entity(&mut self, entity: EntityId) {
        let Some(mask) = self.masks.remove(&entity) else {
            return;
        };
        self.entities.remove(&entity);

        for kind in ALL_KINDS {
            if mask & kind.bit() != 0 {
                self.stores[kind as usize].remove(&entity);
            }
        }
        for set in self.queries.values_mut() {
            set.remove(&entity);
        }
        self.destroyed.push(entity);
    }

    /// Returns true if the entity is in the live set.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entities are alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates live entity ids in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// The component bitmask of an entity (0 if unknown).
    #[inline]
    #[must_use]
    pub fn mask(&self, entity: EntityId) -> u64 {
        self.masks.get(&entity).copied().unwrap_or(0)
    }

    /// Returns true if the entity carries this component kind.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: EntityId, kind: ComponentKind) -> bool {
        self.mask(entity) & kind.bit() != 0
    }

    /// Attaches (or replaces) a component, updating the bitmask and
    /// incrementally patching every memoized query whose mask intersects
    /// the changed bit.
    pub fn add_component(&mut self, entity: EntityId, component: Component) {
        let kind = component.kind();
        let Some(mask) = self.masks.get_mut(&entity) else {
            tracing::warn!(%entity, ?kind, "add_component on dead entity ignored");
            return;
        };
        let old_mask = *mask;
        let new_mask = old_mask | kind.bit();
        *mask = new_mask;
        self.stores[kind as usize].insert(entity, component);
        if old_mask != new_mask {
            self.patch_queries(entity, old_mask, new_mask, kind.bit());
        }
    }

    /// Detaches a component, returning it if present.
    pub fn remove_component(&mut self, entity: EntityId, kind: ComponentKind) -> Option<Component> {
        let mask = self.masks.get_mut(&entity)?;
        let old_mask = *mask;
        if old_mask & kind.bit() == 0 {
            return None;
        }
        let new_mask = old_mask & !kind.bit();
        *mask = new_mask;
        let removed = self.stores[kind as usize].remove(&entity);
        self.patch_queries(entity, old_mask, new_mask, kind.bit());
        removed
    }

    /// Reads a component.
    #[must_use]
    pub fn get(&self, entity: EntityId, kind: ComponentKind) -> Option<&Component> {
        self.stores[kind as usize].get(&entity)
    }

    /// Mutable access to a component.
    pub fn get_mut(&mut self, entity: EntityId, kind: ComponentKind) -> Option<&mut Component> {
        self.stores[kind as usize].get_mut(&entity)
    }

    /// All components of one entity, in kind order.
    #[must_use]
    pub fn components_of(&self, entity: EntityId) -> Vec<Component> {
        let mask = self.mask(entity);
        ALL_KINDS
            .iter()
            .filter(|k| mask & k.bit() != 0)
            .filter_map(|k| self.stores[*k as usize].get(&entity).cloned())
            .collect()
    }

    /// Entities carrying every listed kind, from the memoized query cache.
    ///
    /// The backing set is built lazily with one O(entities) scan on first
    /// use and maintained incrementally forever after. An empty kind list
    /// has no mask to memoize and falls back to the documented linear scan
    /// (degraded path, warns; returns all live entities).
    pub fn entities_with(&mut self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        let mask = ComponentKind::mask(kinds);
        if mask == 0 {
            tracing::warn!("query with no component kinds: falling back to linear scan");
            return self.scan_entities_with(kinds);
        }

        if !self.queries.contains_key(&mask) {
            let set: BTreeSet<EntityId> = self
                .masks
                .iter()
                .filter(|(_, m)| **m & mask == mask)
                .map(|(e, _)| *e)
                .collect();
            self.queries.insert(mask, set);
        }
        self.queries[&mask].iter().copied().collect()
    }

    /// Uncached O(entities x kinds) query: checks every live entity's
    /// component stores directly. Slow but never silently wrong; this is
    /// the fallback for queries the cache cannot serve.
    #[must_use]
    pub fn scan_entities_with(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| {
                kinds
                    .iter()
                    .all(|k| self.stores[*k as usize].contains_key(e))
            })
            .copied()
            .collect()
    }

    /// Drains entity ids destroyed since the last call.
    pub fn drain_destroyed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.destroyed)
    }

    /// Drains entity ids created since the last call.
    pub fn drain_created(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.created)
    }

    /// Patches memoized query sets after one bit changed on one entity.
    ///
    /// Only queries whose mask intersects the changed bit can change
    /// membership; every other cached set is left untouched.
    fn patch_queries(&mut self, entity: EntityId, old_mask: u64, new_mask: u64, changed_bit: u64) {
        for (query_mask, set) in &mut self.queries {
            if query_mask & changed_bit == 0 {
                continue;
            }
            let was = old_mask & query_mask == *query_mask;
            let is = new_mask & query_mask == *query_mask;
            if was && !is {
                set.remove(&entity);
            } else if !was && is {
                set.insert(entity);
            }
        }
    }

    typed_accessor!(position, position_mut, Position, super::component::Position);
    typed_accessor!(velocity, velocity_mut, Velocity, super::component::Velocity);
    typed_accessor!(rotation, rotation_mut, Rotation, super::component::Rotation);
    typed_accessor!(economy, economy_mut, Economy, super::component::Economy);
    typed_accessor!(building, building_mut, Building, super::component::Building);
    typed_accessor!(
        production_chain,
        production_chain_mut,
        ProductionChain,
        super::component::ProductionChain
    );
    typed_accessor!(combat, combat_mut, Combat, super::component::Combat);
    typed_accessor!(shield_arc, shield_arc_mut, ShieldArc, super::component::ShieldArc);
    typed_accessor!(cargo, cargo_mut, Cargo, super::component::Cargo);
    typed_accessor!(logistics, logistics_mut, Logistics, super::component::Logistics);
    typed_accessor!(
        sovereignty,
        sovereignty_mut,
        Sovereignty,
        super::component::Sovereignty
    );
    typed_accessor!(
        corporation,
        corporation_mut,
        Corporation,
        super::component::Corporation
    );
    typed_accessor!(identity, identity_mut, Identity, super::component::Identity);
    typed_accessor!(fleet, fleet_mut, Fleet, super::component::Fleet);
}

impl Default for WorldStore {
    fn default() -> Self {
        Self::new()
    }
}
