//! Error types for the engine.

use crate::config::ConfigError;
use sitegate_store::{BackendError, StoreError};
use sitegate_types::{PermissionDenied, RankingError};
use thiserror::Error;

/// Result type for engine operations.
pub type PermissionsResult<T> = Result<T, PermissionsError>;

/// Everything the engine can surface to a caller.
///
/// Resolution anomalies (missing parent groups, cycles) are not errors:
/// they are logged and skipped.
#[derive(Debug, Error)]
pub enum PermissionsError {
    /// The backend failed; fatal for that backend.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An entity record could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Authorization failure; routine and recoverable.
    #[error(transparent)]
    Denied(#[from] PermissionDenied),

    /// A promotion or demotion was refused.
    #[error(transparent)]
    Ranking(#[from] RankingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PermissionsError {
    /// True for failures the caller is expected to handle routinely.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::Ranking(_))
    }
}
