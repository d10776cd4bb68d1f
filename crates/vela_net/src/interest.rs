//! # Interest Manager
//!
//! Partitions space into fixed-size cubic cells and keeps, per player,
//! the set of entities within one cell of them in every axis (Chebyshev
//! distance <= 1). Snapshots are filtered through this set so a player
//! never pays for the far side of the world.
//!
//! ## Cost Model
//!
//! - Entity move: relocate between two cells, patch only the interest
//!   sets of players whose neighborhood gained or lost that cell
//! - Player move: recompute only when the player's own cell key changed,
//!   rebuilding from at most 27 neighbor cells
//!
//! Both are O(neighborhood), independent of total entity count.

use std::collections::{BTreeSet, HashMap};

use vela_core::{EntityId, Position};

/// Integer cell key, one per axis.
type CellKey = (i64, i64, i64);

/// Cumulative filtering statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterestMetrics {
    /// Entities offered to the filter, total.
    pub entities_in: u64,
    /// Entities that passed the filter, total.
    pub entities_out: u64,
    /// Filter invocations.
    pub queries: u64,
}

impl InterestMetrics {
    /// Fraction of entities removed by filtering, 0.0 when unused.
    #[must_use]
    pub fn reduction_ratio(&self) -> f64 {
        if self.entities_in == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            1.0 - self.entities_out as f64 / self.entities_in as f64
        }
    }
}

/// Spatial visibility index.
pub struct InterestManager {
    cell_size: f64,
    /// Cell -> entities inside it.
    cells: HashMap<CellKey, BTreeSet<EntityId>>,
    /// Entity -> its current cell.
    entity_cells: HashMap<EntityId, CellKey>,
    /// Player -> their current cell.
    player_cells: HashMap<EntityId, CellKey>,
    /// Player -> entities inside their neighborhood.
    interest_sets: HashMap<EntityId, BTreeSet<EntityId>>,
    metrics: InterestMetrics,
}

impl InterestManager {
    /// Creates an index with the given cell edge length.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            player_cells: HashMap::new(),
            interest_sets: HashMap::new(),
            metrics: InterestMetrics::default(),
        }
    }

    fn cell_key(&self, pos: Position) -> CellKey {
        #[allow(clippy::cast_possible_truncation)]
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
            (pos.z / self.cell_size).floor() as i64,
        )
    }

    /// Records an entity's position, relocating it between cells and
    /// patching affected players' interest sets.
    pub fn update_entity(&mut self, entity: EntityId, pos: Position) {
        let new_cell = self.cell_key(pos);
        let old_cell = self.entity_cells.get(&entity).copied();
        if old_cell == Some(new_cell) {
            return;
        }

        if let Some(old) = old_cell {
            if let Some(set) = self.cells.get_mut(&old) {
                set.remove(&entity);
                if set.is_empty() {
                    self.cells.remove(&old);
                }
            }
        }
        self.cells.entry(new_cell).or_default().insert(entity);
        self.entity_cells.insert(entity, new_cell);

        // Patch only players whose neighborhood lost or gained this entity.
        for (player, player_cell) in &self.player_cells {
            let was_visible = old_cell.is_some_and(|c| chebyshev(c, *player_cell) <= 1);
            let is_visible = chebyshev(new_cell, *player_cell) <= 1;
            if was_visible == is_visible {
                continue;
            }
            if let Some(set) = self.interest_sets.get_mut(player) {
                if is_visible {
                    set.insert(entity);
                } else {
                    set.remove(&entity);
                }
            }
        }
    }

    /// Removes an entity from the index and from every interest set.
    pub fn remove_entity(&mut self, entity: EntityId) {
        if let Some(cell) = self.entity_cells.remove(&entity) {
            if let Some(set) = self.cells.get_mut(&cell) {
                set.remove(&entity);
                if set.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        for set in self.interest_sets.values_mut() {
            set.remove(&entity);
        }
    }

    /// Records a player's position; rebuilds their interest set only when
    /// their own cell key changed.
    pub fn update_player(&mut self, player: EntityId, pos: Position) {
        let cell = self.cell_key(pos);
        if self.player_cells.get(&player) == Some(&cell) {
            return;
        }
        self.player_cells.insert(player, cell);

        let mut interest = BTreeSet::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                    if let Some(entities) = self.cells.get(&neighbor) {
                        interest.extend(entities.iter().copied());
                    }
                }
            }
        }
        self.interest_sets.insert(player, interest);
    }

    /// Forgets a player.
    pub fn remove_player(&mut self, player: EntityId) {
        self.player_cells.remove(&player);
        self.interest_sets.remove(&player);
    }

    /// The player's current interest set, if known.
    #[must_use]
    pub fn interest_set(&self, player: EntityId) -> Option<&BTreeSet<EntityId>> {
        self.interest_sets.get(&player)
    }

    /// Intersects `entities` with the player's interest set.
    ///
    /// An unknown player sees nothing. Tracks cumulative reduction
    /// metrics.
    pub fn filter_for_player(&mut self, player: EntityId, entities: &[EntityId]) -> Vec<EntityId> {
        self.metrics.queries += 1;
        self.metrics.entities_in += entities.len() as u64;

        let Some(interest) = self.interest_sets.get(&player) else {
            return Vec::new();
        };
        let visible: Vec<EntityId> = entities
            .iter()
            .copied()
            .filter(|e| interest.contains(e))
            .collect();
        self.metrics.entities_out += visible.len() as u64;
        visible
    }

    /// Cumulative filtering statistics.
    #[must_use]
    pub const fn metrics(&self) -> &InterestMetrics {
        &self.metrics
    }
}

/// Chebyshev distance between two cell keys.
fn chebyshev(a: CellKey, b: CellKey) -> i64 {
    (a.0 - b.0).abs().max((a.1 - b.1).abs()).max((a.2 - b.2).abs())
}
