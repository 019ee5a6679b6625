//! Entity record storage for sitegate.
//!
//! # Architecture
//!
//! - [`EntityData`] is the raw, serializable record of one user or group:
//!   site-scoped permissions, prefixes, suffixes, options and parents.
//! - [`EntityStore`] wraps one record with a read/write lock and persists
//!   every mutation through a [`PermissionBackend`] before publishing it
//!   to readers (copy-on-write).
//! - [`MemoryBackend`] is the in-process backend used by default and in
//!   tests; persistent backends implement the same trait.

mod backend;
mod data;
mod entity_store;
mod error;
mod memory;

pub use backend::{PermissionBackend, SiteInheritance};
pub use data::EntityData;
pub use entity_store::EntityStore;
pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use memory::{BackendSnapshot, MemoryBackend, MEMORY_BACKEND};
