//! Lifecycle storage for Runs and NodeRuns.
//!
//! The store is the single owner of every lifecycle record and the point
//! where updates to one key are serialized.

pub mod fs;
pub mod memory;
pub mod store;

pub use fs::FsLifecycleStore;
pub use memory::MemoryLifecycleStore;
pub use store::{LifecycleStore, SharedLifecycleStore, StoreError, StoreResult};
