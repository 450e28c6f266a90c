//! Cross-item flags and the injector that turns them into fix tasks.

mod injector;
mod types;

pub use injector::FlagInjector;
pub use types::{Flag, FlagStatus, Issue, IssueCategory, Severity};
