use thiserror::Error;

use super::{ErrorCode, StoreError};

/// Validation failures for cross-item flags. Nothing is written when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("item {item} cannot flag itself; cross-item flags need two different items")]
    SelfReference { item: u32 },

    #[error("unknown issue category '{0}' (expected foreshadowing, continuity, pacing, character or plot)")]
    UnknownCategory(String),

    #[error("unknown severity '{0}' (expected low, medium, high or critical)")]
    UnknownSeverity(String),

    #[error("item {item} is out of range 1..={max}")]
    ItemOutOfRange { item: u32, max: u32 },

    #[error("flag not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FlagError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::SelfReference { .. }
            | Self::UnknownCategory(_)
            | Self::UnknownSeverity(_)
            | Self::ItemOutOfRange { .. } => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::TaskNotFound,
            Self::Store(e) => e.error_code(),
        }
    }
}
