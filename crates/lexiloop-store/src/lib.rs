//! lexiloop-store: In-memory review store and event log.
//!
//! Implements the `ReviewStore` and `EventLog` traits from `lexiloop-core`
//! with the uniqueness guarantees the engine relies on, plus JSON snapshot
//! persistence for the CLI.

pub mod memory;

pub use memory::{MemoryStore, Snapshot};
