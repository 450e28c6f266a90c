//! Watchdogs that stop a workflow before it loops forever or grows without
//! bound. Every trip is a [`GuardError`](crate::error::GuardError) carrying
//! the measured values and the configured limit.

mod battery;
mod cycle;
mod health;

pub use battery::{GuardConfig, GuardStatus, SafetyGuards};
pub use cycle::{check_circular_dependency, find_any_cycle};
pub use health::{HealthMonitor, HealthReport};
