use thiserror::Error;

use super::{ExecutorError, FlagError, StoreError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("workflow failed: {0}")]
    Executor(#[from] ExecutorError),
    #[error("flag rejected: {0}")]
    Flag(#[from] FlagError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
