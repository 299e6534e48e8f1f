//! Snapshot store backends.
//!
//! The `SnapshotStore` trait is the persistence collaborator contract;
//! backends live in submodules.

mod memory;
#[cfg(feature = "persistent")]
pub mod persistent;
mod traits;

pub use memory::InMemorySnapshotStore;
#[cfg(feature = "persistent")]
pub use persistent::{open_store, FileSnapshotStore, PersistentConfig};
pub use traits::{SnapshotStore, StorageError};
