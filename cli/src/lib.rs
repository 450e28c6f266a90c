//! folio-cli library: command implementations, exposed for unit tests.

pub mod commands;

use folio_core::error::{self, CliError};

/// 0: success
/// 1: workflow finished with failed tasks (returned as a normal exit code)
/// 2: config or argument error
/// 3: unresolved dependencies or a tripped safety guard
/// 4: other runtime error
pub fn exit_code_for_error(e: &CliError) -> i32 {
    match e {
        CliError::Config(_) | CliError::Flag(_) => 2,
        CliError::Executor(ee) => match ee {
            error::ExecutorError::UnresolvedDependencies { .. } => 3,
            error::ExecutorError::Guard(_) => 3,
            error::ExecutorError::Store(_) => 4,
            error::ExecutorError::Runner(_) => 4,
        },
        CliError::Store(_) => 4,
        CliError::Io(_) => 4,
        CliError::Command(_) => 4,
        CliError::Anyhow(_) => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::api::GuardError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for_error(&CliError::Config("bad".into())), 2);
        let guard = CliError::Executor(error::ExecutorError::Guard(GuardError::FlagExplosion {
            open_flags: 101,
            max_open_flags: 100,
        }));
        assert_eq!(exit_code_for_error(&guard), 3);
        let unresolved = CliError::Executor(error::ExecutorError::UnresolvedDependencies {
            unresolved: vec!["a".into()],
            cycle: Some(vec!["a".into(), "a".into()]),
            dangling: Vec::new(),
        });
        assert_eq!(exit_code_for_error(&unresolved), 3);
        assert_eq!(exit_code_for_error(&CliError::Command("x".into())), 4);
    }
}
