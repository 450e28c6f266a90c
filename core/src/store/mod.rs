//! Durable task graph store.
//!
//! Tasks live in one growable map keyed by stable id. Every mutation is
//! written through to a [`StateBackend`] before the call returns, so a store
//! reopened over the same backend sees the latest state.

mod backend;
mod file;
mod stats;
#[allow(clippy::module_inception)]
mod store;

pub use backend::{MemoryBackend, StateBackend};
pub use file::FileBackend;
pub use stats::WorkflowStats;
pub use store::TaskStore;
