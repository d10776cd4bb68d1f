//! # VELA Persistence
//!
//! The durable boundary under the live world:
//!
//! ```text
//! simulation tick
//!   │ put / get / remove        (always hits the cache first)
//!   ▼
//! EntityCache   {record, dirty, last_access} per entity
//!   │ periodic flush: dirty set + write queue + deferred deletes,
//!   │ one batched write transaction, single in-flight gate
//!   ▼
//! EntityStore   LMDB: one named database per component kind,
//!               rows keyed by entity id, spatial queries on position
//! ```
//!
//! A durable I/O failure surfaces as [`PersistError`]; the cache keeps
//! its state and the next flush retries.

pub mod cache;
pub mod error;
pub mod store;

pub use cache::{CacheMetrics, EntityCache};
pub use error::PersistError;
pub use store::{EntityRecord, EntityStore};
