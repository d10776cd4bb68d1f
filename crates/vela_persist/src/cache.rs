//! # Write-Back Entity Cache
//!
//! In-memory `{record, dirty, last_access}` layer over the durable
//! store, bounding write amplification under churn: hot entities mutate
//! in memory every tick and reach disk once per flush interval.
//!
//! ## Flush Contract
//!
//! - dirty entries, the write queue and deferred deletes go out in ONE
//!   batched transaction
//! - flags and queues clear only after the commit succeeds
//! - a second flush with nothing new performs zero durable writes
//! - a single in-flight gate forbids overlapping flushes
//! - on failure the cache stays authoritative and the next flush retries

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use vela_core::EntityId;

use crate::error::PersistResult;
use crate::store::{EntityRecord, EntityStore};

/// Cache observability counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheMetrics {
    /// Reads served from memory.
    pub hits: u64,
    /// Reads that went to the durable store.
    pub misses: u64,
    /// Writes queued for the next flush.
    pub deferred_writes: u64,
    /// Writes pushed through synchronously.
    pub immediate_writes: u64,
    /// Flushes that committed.
    pub flushes: u64,
    /// Rows written by flushes, total.
    pub flushed_rows: u64,
    /// Flush attempts skipped because one was in flight.
    pub skipped_flushes: u64,
}

struct CacheEntry {
    record: EntityRecord,
    dirty: bool,
    last_access: Instant,
}

struct CacheState {
    entries: HashMap<EntityId, CacheEntry>,
    /// Entities queued for deferred write.
    write_queue: BTreeSet<EntityId>,
    /// Entities queued for deferred durable delete.
    delete_queue: BTreeSet<EntityId>,
    metrics: CacheMetrics,
}

/// Write-back cache over an [`EntityStore`].
pub struct EntityCache {
    store: EntityStore,
    state: Mutex<CacheState>,
    /// Entries older than this are reloaded from the store on read.
    max_entry_age: std::time::Duration,
    /// Single in-flight-flush gate.
    flushing: AtomicBool,
}

impl EntityCache {
    /// Wraps a store; cached reads expire after `max_entry_age_ms`.
    #[must_use]
    pub fn new(store: EntityStore, max_entry_age_ms: u64) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                write_queue: BTreeSet::new(),
                delete_queue: BTreeSet::new(),
                metrics: CacheMetrics::default(),
            }),
            max_entry_age: std::time::Duration::from_millis(max_entry_age_ms),
            flushing: AtomicBool::new(false),
        }
    }

    /// Reads one entity: from memory when present and fresh, otherwise
    /// load-and-populate from the durable store.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable load fails.
    pub fn get(&self, entity: EntityId) -> PersistResult<Option<EntityRecord>> {
        let mut state = self.state.lock();

        let fresh = state.entries.get(&entity).is_some_and(|entry| {
            entry.dirty || entry.last_access.elapsed() < self.max_entry_age
        });
        if fresh {
            state.metrics.hits += 1;
            let entry = state
                .entries
                .get_mut(&entity)
                .map(|entry| {
                    entry.last_access = Instant::now();
                    entry.record.clone()
                });
            return Ok(entry);
        }

        state.metrics.misses += 1;
        drop(state);
        let loaded = self.store.load(entity)?;
        if let Some(record) = &loaded {
            self.state.lock().entries.insert(
                entity,
                CacheEntry {
                    record: record.clone(),
                    dirty: false,
                    last_access: Instant::now(),
                },
            );
        }
        Ok(loaded)
    }

    /// Writes one entity: the cache updates immediately; `immediate`
    /// also writes through synchronously, otherwise the entity is marked
    /// dirty and queued for the next flush.
    ///
    /// # Errors
    ///
    /// Only an immediate write can fail; the cache entry stays dirty so
    /// the next flush retries.
    pub fn put(&self, record: EntityRecord, immediate: bool) -> PersistResult<()> {
        let entity = record.entity;
        {
            let mut state = self.state.lock();
            state.delete_queue.remove(&entity);
            state.entries.insert(
                entity,
                CacheEntry {
                    record: record.clone(),
                    dirty: true,
                    last_access: Instant::now(),
                },
            );
            if !immediate {
                state.write_queue.insert(entity);
                state.metrics.deferred_writes += 1;
                return Ok(());
            }
        }

        self.store.save(&record)?;
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(&entity) {
            entry.dirty = false;
        }
        state.write_queue.remove(&entity);
        state.metrics.immediate_writes += 1;
        Ok(())
    }

    /// Removes an entity from cache and queues; deletes durably either
    /// synchronously or on the next flush.
    ///
    /// # Errors
    ///
    /// Only an immediate delete can fail; it stays queued for retry.
    pub fn remove(&self, entity: EntityId, immediate: bool) -> PersistResult<()> {
        {
            let mut state = self.state.lock();
            state.entries.remove(&entity);
            state.write_queue.remove(&entity);
            if !immediate {
                state.delete_queue.insert(entity);
                return Ok(());
            }
            state.delete_queue.insert(entity);
        }

        self.store.delete(entity)?;
        self.state.lock().delete_queue.remove(&entity);
        Ok(())
    }

    /// Flushes everything pending in one batched transaction, returning
    /// the number of rows written.
    ///
    /// Overlapping calls are skipped, not queued. On failure the dirty
    /// state is kept and surfaced; the next flush retries.
    ///
    /// # Errors
    ///
    /// Returns the durable failure, with the cache unchanged.
    pub fn flush(&self) -> PersistResult<usize> {
        if self.flushing.swap(true, Ordering::AcqRel) {
            self.state.lock().metrics.skipped_flushes += 1;
            tracing::debug!("flush already in flight, skipping");
            return Ok(0);
        }
        let result = self.flush_inner();
        self.flushing.store(false, Ordering::Release);
        result
    }

    fn flush_inner(&self) -> PersistResult<usize> {
        // Snapshot the pending work under the lock, write outside it.
        let (records, deletes) = {
            let state = self.state.lock();
            let mut pending: BTreeSet<EntityId> = state.write_queue.clone();
            for (entity, entry) in &state.entries {
                if entry.dirty {
                    pending.insert(*entity);
                }
            }
            let records: Vec<EntityRecord> = pending
                .iter()
                .filter_map(|e| state.entries.get(e).map(|entry| entry.record.clone()))
                .collect();
            let deletes: Vec<EntityId> = state.delete_queue.iter().copied().collect();
            (records, deletes)
        };

        if records.is_empty() && deletes.is_empty() {
            return Ok(0);
        }

        self.store.upsert_batch(&records)?;
        self.store.delete_batch(&deletes)?;

        let mut state = self.state.lock();
        for record in &records {
            if let Some(entry) = state.entries.get_mut(&record.entity) {
                entry.dirty = false;
            }
            state.write_queue.remove(&record.entity);
        }
        for entity in &deletes {
            state.delete_queue.remove(entity);
        }
        state.metrics.flushes += 1;
        state.metrics.flushed_rows += records.len() as u64;
        tracing::debug!(rows = records.len(), deletes = deletes.len(), "flush committed");
        Ok(records.len())
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics
    }

    /// Entities currently marked dirty or queued.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        let state = self.state.lock();
        let dirty = state.entries.values().filter(|e| e.dirty).count();
        dirty.max(state.write_queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{Component, Economy, Position};

    fn record(id: u64, metal: f64) -> EntityRecord {
        EntityRecord::new(
            EntityId(id),
            vec![
                Component::Position(Position::new(metal, 0.0, 0.0)),
                Component::Economy(Economy::with_stock(metal, 0.0, 0.0)),
            ],
        )
    }

    fn cache() -> (EntityCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::open(dir.path()).unwrap();
        (EntityCache::new(store, 300_000), dir)
    }

    #[test]
    fn test_deferred_write_not_durable_before_flush() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EntityStore::open(dir.path()).unwrap();
            let cache = EntityCache::new(store, 300_000);
            cache.put(record(1, 10.0), false).unwrap();
            assert_eq!(cache.pending_writes(), 1);
            // Dropped without flushing.
        }
        let probe = EntityStore::open(dir.path()).unwrap();
        assert!(probe.load(EntityId(1)).unwrap().is_none());
    }

    #[test]
    fn test_deferred_write_durable_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EntityStore::open(dir.path()).unwrap();
            let cache = EntityCache::new(store, 300_000);
            cache.put(record(1, 10.0), false).unwrap();
            assert_eq!(cache.flush().unwrap(), 1);
        }
        let probe = EntityStore::open(dir.path()).unwrap();
        assert!(probe.load(EntityId(1)).unwrap().is_some());
    }

    #[test]
    fn test_flush_is_idempotent() {
        let (cache, _dir) = cache();
        cache.put(record(1, 10.0), false).unwrap();
        cache.put(record(2, 20.0), false).unwrap();

        assert_eq!(cache.flush().unwrap(), 2);
        // Nothing new: zero durable writes.
        assert_eq!(cache.flush().unwrap(), 0);
        assert_eq!(cache.metrics().flushes, 1);
    }

    #[test]
    fn test_immediate_write_through() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EntityStore::open(dir.path()).unwrap();
            let cache = EntityCache::new(store, 300_000);
            cache.put(record(1, 10.0), true).unwrap();
            assert_eq!(cache.pending_writes(), 0);
            assert_eq!(cache.metrics().immediate_writes, 1);
        }
        let probe = EntityStore::open(dir.path()).unwrap();
        assert!(probe.load(EntityId(1)).unwrap().is_some());
    }

    #[test]
    fn test_read_miss_populates_cache() {
        let (cache, _dir) = cache();
        cache.put(record(1, 10.0), true).unwrap();

        // Fresh cache over the same store directory would miss; here the
        // entry is already cached, so this hits.
        assert!(cache.get(EntityId(1)).unwrap().is_some());
        assert!(cache.get(EntityId(2)).unwrap().is_none());

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[test]
    fn test_deferred_delete_runs_at_flush() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EntityStore::open(dir.path()).unwrap();
            let cache = EntityCache::new(store, 300_000);
            cache.put(record(1, 10.0), true).unwrap();
            cache.remove(EntityId(1), false).unwrap();
            // Evicted from memory immediately; the durable row survives
            // until the flush carries the delete.
            assert!(cache.get(EntityId(1)).unwrap().is_some(), "reloads from store");
            cache.remove(EntityId(1), false).unwrap();
            cache.flush().unwrap();
        }
        let probe = EntityStore::open(dir.path()).unwrap();
        assert!(probe.load(EntityId(1)).unwrap().is_none());
    }

    #[test]
    fn test_dirty_overwrite_flushes_latest() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EntityStore::open(dir.path()).unwrap();
            let cache = EntityCache::new(store, 300_000);
            cache.put(record(1, 10.0), false).unwrap();
            cache.put(record(1, 99.0), false).unwrap();
            cache.flush().unwrap();
        }
        let probe = EntityStore::open(dir.path()).unwrap();
        let loaded = probe.load(EntityId(1)).unwrap().unwrap();
        let Component::Economy(economy) = &loaded.components[1] else {
            panic!("expected economy row");
        };
        assert!((economy.stock.metal - 99.0).abs() < f64::EPSILON);
    }
}
