//! In-memory storage backend.
//!
//! Thread-safe, non-durable. Intended for tests, benchmarks, and hosts that
//! persist the snapshot themselves.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::snapshot::BufferSnapshot;
use crate::storage::traits::{SnapshotStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct State {
    snapshot: BufferSnapshot,
    active: bool,
}

/// In-memory `SnapshotStore`.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: RwLock<State>,
}

impl InMemorySnapshotStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a snapshot (e.g., restored by the host).
    #[must_use]
    pub fn with_snapshot(snapshot: BufferSnapshot) -> Self {
        Self {
            inner: RwLock::new(State {
                snapshot,
                active: false,
            }),
        }
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save_snapshot(&self, content: &str, observed_at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut state = self.inner.write().map_err(|_| lock_err("snapshot"))?;
        state.snapshot = BufferSnapshot::accepted(content, observed_at);
        Ok(())
    }

    fn load_snapshot(&self) -> Result<BufferSnapshot, StorageError> {
        let state = self.inner.read().map_err(|_| lock_err("snapshot"))?;
        Ok(state.snapshot.clone())
    }

    fn set_active(&self, active: bool) -> Result<(), StorageError> {
        let mut state = self.inner.write().map_err(|_| lock_err("active"))?;
        state.active = active;
        Ok(())
    }

    fn get_active(&self) -> Result<bool, StorageError> {
        let state = self.inner.read().map_err(|_| lock_err("active"))?;
        Ok(state.active)
    }
}
