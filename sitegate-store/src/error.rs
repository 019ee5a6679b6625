//! Error types for the storage layer.

use sitegate_types::EntityRef;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for entity store mutations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A backend failed to initialise, load or persist.
///
/// Fatal for the affected backend: callers surface it rather than falling
/// back to another backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend could not be constructed or opened.
    #[error("backend initialization failed: {0}")]
    Initialization(String),

    /// No backend is registered under this name.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// Reading or writing records failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from mutating an [`EntityStore`](crate::EntityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The record was removed; the handle is stale and must be re-fetched.
    #[error("entity {0} has been removed")]
    Removed(EntityRef),

    /// The store belongs to a backend that has since been replaced or
    /// reloaded; the handle is stale and must be re-fetched.
    #[error("entity {0} belongs to a retired backend")]
    Retired(EntityRef),
}
