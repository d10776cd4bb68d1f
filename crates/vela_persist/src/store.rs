//! # Durable Entity Store
//!
//! LMDB-backed storage with one named database per component kind, so
//! each kind is a normalized table keyed by big-endian entity id. Rows
//! are bincode-encoded component values.
//!
//! Saving an entity is authoritative: kinds the record carries are
//! upserted, kinds it no longer carries are deleted, all inside the same
//! write transaction. `upsert_batch` extends that to many entities in
//! ONE transaction, which is the primitive the write-back cache's flush
//! depends on.
//!
//! Spatial queries (`within_radius`, `within_rect`, `nearest`) scan the
//! position table.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use vela_core::{Component, EntityId, Position, ALL_KINDS, KIND_COUNT};

use crate::error::{PersistError, PersistResult};

/// Maximum LMDB map size, 1 GiB.
const MAP_SIZE: usize = 1024 * 1024 * 1024;

/// One entity's full durable row set.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    /// Row key.
    pub entity: EntityId,
    /// Every component the entity carries.
    pub components: Vec<Component>,
}

impl EntityRecord {
    /// Builds a record.
    #[must_use]
    pub fn new(entity: EntityId, components: Vec<Component>) -> Self {
        Self { entity, components }
    }

    /// The record's position component, if it has one.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.components.iter().find_map(|c| match c {
            Component::Position(p) => Some(*p),
            _ => None,
        })
    }
}

/// LMDB-backed component tables.
pub struct EntityStore {
    env: Env,
    /// One database per component kind, indexed by discriminant.
    tables: Vec<Database<Bytes, Bytes>>,
}

impl EntityStore {
    /// Opens or creates the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment or a table cannot be created.
    #[allow(unsafe_code)]
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).ok();

        // SAFETY: each store path is opened once per process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(KIND_COUNT as u32)
                .open(path)
                .map_err(PersistError::from)?
        };

        let mut wtxn = env.write_txn()?;
        let mut tables = Vec::with_capacity(KIND_COUNT);
        for kind in ALL_KINDS {
            tables.push(env.create_database(&mut wtxn, Some(kind.table_name()))?);
        }
        wtxn.commit()?;

        Ok(Self { env, tables })
    }

    /// Saves one entity's rows in a single write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error on transaction or encoding failure; nothing is
    /// written in that case.
    pub fn save(&self, record: &EntityRecord) -> PersistResult<()> {
        let mut wtxn = self.env.write_txn()?;
        self.write_record(&mut wtxn, record)?;
        wtxn.commit()?;
        tracing::trace!(entity = %record.entity, "persisted entity");
        Ok(())
    }

    /// Saves many entities' rows in ONE write transaction.
    ///
    /// # Errors
    ///
    /// All-or-nothing: any failure aborts the transaction.
    pub fn upsert_batch(&self, records: &[EntityRecord]) -> PersistResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut wtxn = self.env.write_txn()?;
        for record in records {
            self.write_record(&mut wtxn, record)?;
        }
        wtxn.commit()?;
        tracing::debug!(rows = records.len(), "batched upsert committed");
        Ok(())
    }

    fn write_record(&self, wtxn: &mut heed::RwTxn, record: &EntityRecord) -> PersistResult<()> {
        let key = record.entity.raw().to_be_bytes();
        for kind in ALL_KINDS {
            let component = record.components.iter().find(|c| c.kind() == kind);
            let table = &self.tables[kind as usize];
            match component {
                Some(component) => {
                    let bytes = bincode::serialize(component)?;
                    table.put(wtxn, &key, &bytes)?;
                }
                None => {
                    table.delete(wtxn, &key)?;
                }
            }
        }
        Ok(())
    }

    /// Loads one entity's rows, `None` when no table has it.
    ///
    /// # Errors
    ///
    /// Returns an error on read or decode failure.
    pub fn load(&self, entity: EntityId) -> PersistResult<Option<EntityRecord>> {
        let key = entity.raw().to_be_bytes();
        let rtxn = self.env.read_txn()?;

        let mut components = Vec::new();
        for kind in ALL_KINDS {
            if let Some(bytes) = self.tables[kind as usize].get(&rtxn, &key)? {
                components.push(bincode::deserialize(bytes)?);
            }
        }
        if components.is_empty() {
            return Ok(None);
        }
        Ok(Some(EntityRecord { entity, components }))
    }

    /// Deletes one entity from every table.
    ///
    /// # Errors
    ///
    /// Returns an error on transaction failure.
    pub fn delete(&self, entity: EntityId) -> PersistResult<()> {
        self.delete_batch(&[entity])
    }

    /// Deletes many entities in one write transaction.
    ///
    /// # Errors
    ///
    /// All-or-nothing: any failure aborts the transaction.
    pub fn delete_batch(&self, entities: &[EntityId]) -> PersistResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut wtxn = self.env.write_txn()?;
        for entity in entities {
            let key = entity.raw().to_be_bytes();
            for table in &self.tables {
                table.delete(&mut wtxn, &key)?;
            }
        }
        wtxn.commit()?;
        Ok(())
    }

    /// Entities whose stored position lies within `radius` of `center`.
    ///
    /// # Errors
    ///
    /// Returns an error on read or decode failure.
    pub fn within_radius(
        &self,
        center: Position,
        radius: f64,
    ) -> PersistResult<Vec<(EntityId, Position)>> {
        self.scan_positions(|pos| pos.distance(center) <= radius)
    }

    /// Entities whose stored position lies inside the axis-aligned box
    /// spanned by `min` and `max`.
    ///
    /// # Errors
    ///
    /// Returns an error on read or decode failure.
    pub fn within_rect(
        &self,
        min: Position,
        max: Position,
    ) -> PersistResult<Vec<(EntityId, Position)>> {
        self.scan_positions(|pos| {
            pos.x >= min.x
                && pos.x <= max.x
                && pos.y >= min.y
                && pos.y <= max.y
                && pos.z >= min.z
                && pos.z <= max.z
        })
    }

    /// The stored entity nearest to `center`, if any rows exist.
    ///
    /// # Errors
    ///
    /// Returns an error on read or decode failure.
    pub fn nearest(&self, center: Position) -> PersistResult<Option<(EntityId, Position)>> {
        let all = self.scan_positions(|_| true)?;
        Ok(all.into_iter().min_by(|(_, a), (_, b)| {
            a.distance(center)
                .partial_cmp(&b.distance(center))
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
    }

    fn scan_positions<F>(&self, keep: F) -> PersistResult<Vec<(EntityId, Position)>>
    where
        F: Fn(Position) -> bool,
    {
        let rtxn = self.env.read_txn()?;
        let table = &self.tables[vela_core::ComponentKind::Position as usize];

        let mut results = Vec::new();
        for row in table.iter(&rtxn)? {
            let (key, bytes) = row?;
            let Ok(key_bytes) = <[u8; 8]>::try_from(key) else {
                tracing::warn!("skipping malformed position row key");
                continue;
            };
            let entity = EntityId(u64::from_be_bytes(key_bytes));
            if let Component::Position(pos) = bincode::deserialize::<Component>(bytes)? {
                if keep(pos) {
                    results.push((entity, pos));
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{Combat, Economy};

    fn record(id: u64, x: f64) -> EntityRecord {
        EntityRecord::new(
            EntityId(id),
            vec![
                Component::Position(Position::new(x, 0.0, 0.0)),
                Component::Economy(Economy::with_stock(100.0, 0.0, 0.0)),
            ],
        )
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();

        let rec = record(1, 5.0);
        store.save(&rec).unwrap();

        let loaded = store.load(EntityId(1)).unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn test_load_unknown_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();
        assert_eq!(store.load(EntityId(42)).unwrap(), None);
    }

    #[test]
    fn test_save_removes_dropped_components() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();

        store.save(&record(1, 5.0)).unwrap();
        // Re-save without the economy row.
        let slim = EntityRecord::new(
            EntityId(1),
            vec![Component::Position(Position::new(6.0, 0.0, 0.0))],
        );
        store.save(&slim).unwrap();

        let loaded = store.load(EntityId(1)).unwrap().unwrap();
        assert_eq!(loaded.components.len(), 1);
    }

    #[test]
    fn test_batch_upsert_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();

        let records: Vec<EntityRecord> = (0..10).map(|i| record(i, f64::from(i as u32))).collect();
        store.upsert_batch(&records).unwrap();
        for rec in &records {
            assert!(store.load(rec.entity).unwrap().is_some());
        }

        store
            .delete_batch(&[EntityId(0), EntityId(1), EntityId(2)])
            .unwrap();
        assert!(store.load(EntityId(0)).unwrap().is_none());
        assert!(store.load(EntityId(3)).unwrap().is_some());
    }

    #[test]
    fn test_spatial_queries() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();

        store.save(&record(1, 0.0)).unwrap();
        store.save(&record(2, 10.0)).unwrap();
        store.save(&record(3, 100.0)).unwrap();

        let near = store
            .within_radius(Position::new(0.0, 0.0, 0.0), 20.0)
            .unwrap();
        assert_eq!(near.len(), 2);

        let boxed = store
            .within_rect(Position::new(5.0, -1.0, -1.0), Position::new(50.0, 1.0, 1.0))
            .unwrap();
        assert_eq!(boxed.len(), 1);
        assert_eq!(boxed[0].0, EntityId(2));

        let (nearest, _) = store.nearest(Position::new(95.0, 0.0, 0.0)).unwrap().unwrap();
        assert_eq!(nearest, EntityId(3));
    }

    #[test]
    fn test_entity_without_position_not_in_spatial_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();

        store
            .save(&EntityRecord::new(
                EntityId(7),
                vec![Component::Combat(Combat {
                    hp: 1.0,
                    max_hp: 1.0,
                    firepower: 0.0,
                    target: None,
                    fire_rate: 1.0,
                    last_fire_at: 0.0,
                })],
            ))
            .unwrap();

        let all = store
            .within_radius(Position::new(0.0, 0.0, 0.0), f64::MAX)
            .unwrap();
        assert!(all.is_empty());
    }
}
