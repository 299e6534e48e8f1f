//! Abstract storage trait for the snapshot store.
//!
//! The observer only needs a tiny durable key/value contract: the last
//! accepted snapshot and the "observer active" flag. Backends:
//! - In-memory for tests and hosts with their own persistence
//! - Persistent (journal + file lock) for restart survival

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::snapshot::BufferSnapshot;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process owns the store.
    #[error("Snapshot store at '{path}' is locked by another process")]
    Locked {
        /// Directory of the locked store.
        path: String,
    },

    /// Backend-internal failure (poisoned lock and similar).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Durable record of the last accepted snapshot and the active flag.
///
/// # Contract
/// - `save_snapshot` followed by `load_snapshot` returns the saved pair
/// - Persistent implementations must survive process restart
/// - Only the change detector writes snapshots; only the lifecycle
///   controller writes the active flag
pub trait SnapshotStore: Send + Sync {
    /// Record `content` as accepted at `observed_at`.
    fn save_snapshot(&self, content: &str, observed_at: DateTime<Utc>) -> Result<(), StorageError>;

    /// The last saved snapshot, or `BufferSnapshot::unknown()` if none.
    fn load_snapshot(&self) -> Result<BufferSnapshot, StorageError>;

    /// Record whether the observer is attached.
    fn set_active(&self, active: bool) -> Result<(), StorageError>;

    /// Last recorded active flag, `false` if never set.
    fn get_active(&self) -> Result<bool, StorageError>;
}
