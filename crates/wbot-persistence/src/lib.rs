//! Session snapshot persistence for the wallet bot.
//!
//! Keeps one durable slot holding the whitelisted subset of session state
//! used for cold-start recovery:
//! - `PersistedSnapshot` / `SnapshotPatch`: slot schema and partial updates
//! - `SessionStore`: save/load/clear contract (`JsonFileStore`, `MemoryStore`)
//! - `WriteBehind`: buffers patches and flushes them off the command path

pub mod error;
pub mod snapshot;
pub mod store;
pub mod write_behind;

pub use error::{PersistenceError, PersistenceResult};
pub use snapshot::{PersistedSnapshot, SnapshotPatch};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
pub use write_behind::WriteBehind;
