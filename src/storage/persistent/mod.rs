//! Persistent snapshot store.
//!
//! Durable, crash-safe storage for the last accepted snapshot and the
//! observer's active flag:
//! - Append-only journal, replayed last-write-wins on open
//! - File locking for single-process access
//! - CRC32 checksums for corruption detection
//! - Compaction by temp-file rename once the journal outgrows its limit
//!
//! # Layout
//!
//! ```text
//! <dir>/
//! ├── .lock               exclusive flock / LockFileEx
//! └── snapshot.journal    [header][record][record]...
//! ```

mod codec;
mod file_lock;
mod journal;
mod store;

pub use file_lock::FileLock;
pub use journal::{Journal, JournalRecord, RecordKind, ReplayedState};
pub use store::FileSnapshotStore;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::traits::StorageError;

/// Configuration for the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Journal size that triggers compaction (bytes).
    pub max_journal_size: u64,
    /// Whether to fsync after every write (slower but safer).
    pub sync_on_write: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            max_journal_size: 64 * 1024,
            sync_on_write: true,
        }
    }
}

impl PersistentConfig {
    const MIN_JOURNAL_SIZE: u64 = 1024; // below this every write compacts

    /// Rejects a journal limit small enough to compact on every write.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_journal_size < Self::MIN_JOURNAL_SIZE {
            return Err(ConfigError::OutOfRange {
                field: "max_journal_size".to_string(),
                reason: format!(
                    "must be at least {} bytes (got {})",
                    Self::MIN_JOURNAL_SIZE,
                    self.max_journal_size
                ),
            });
        }
        Ok(self)
    }
}

/// Open or create a persistent snapshot store in `path`.
///
/// # Errors
/// - `StorageError::Locked` if another process holds the store
/// - `StorageError::Io` if the directory cannot be created or read
/// - `StorageError::Backend` if `config` fails validation
///
/// # Example
/// ```rust,ignore
/// use clipwatch::storage::open_store;
///
/// let store = open_store("./clipwatch-state", None)?;
/// let observer = ClipboardObserver::builder(Arc::new(source), Arc::new(store)).build()?;
/// ```
pub fn open_store(path: impl AsRef<Path>, config: Option<PersistentConfig>) -> Result<FileSnapshotStore, StorageError> {
    let cfg = config
        .unwrap_or_default()
        .validate()
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    FileSnapshotStore::open(path.as_ref(), cfg)
}
