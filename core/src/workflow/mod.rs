//! Per-run wiring and the standard four-phase template.

mod bootstrap;
mod context;

pub use bootstrap::{initialize_standard_workflow, Phase};
pub use context::WorkflowContext;
