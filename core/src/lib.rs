//! Wave-based task orchestration for multi-item manuscript workflows.
//!
//! Tasks live in a [`store::TaskStore`]; the resolver in [`executor`]
//! partitions them into dependency waves; [`executor::ParallelExecutor`] runs
//! each wave concurrently under per-provider [`ratelimit`] limits while
//! [`guards`] watch for runaway runs and [`flags`] turns cross-item issues
//! into new fix tasks.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod flags;
pub mod guards;
pub mod ratelimit;
pub mod store;
pub mod task;
pub mod workflow;
