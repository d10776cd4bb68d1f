//! # Persistence Errors

use thiserror::Error;

/// Durable storage failure.
///
/// Callers surface this and retry on the next flush interval; the cache
/// stays authoritative in the meantime.
#[derive(Debug, Error)]
pub enum PersistError {
    /// LMDB environment or transaction failure.
    #[error("database error: {0}")]
    Db(#[from] heed::Error),

    /// Row encode/decode failure.
    #[error("row encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Convenience alias.
pub type PersistResult<T> = Result<T, PersistError>;
