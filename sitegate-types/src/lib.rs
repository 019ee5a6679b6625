//! Core type definitions for sitegate.
//!
//! This crate defines the plain, storage-agnostic types shared by the
//! store and the engine:
//! - Entity identity ([`EntityKind`], [`EntityRef`])
//! - Entity and system lifecycle events
//! - Permission string helpers (negation, wildcard matching)
//! - Authorization and ranking failures that surface to callers
//!
//! Nothing here holds state or performs I/O.

mod denied;
mod entity;
mod event;
pub mod permission;
mod ranking;

pub use denied::{DeniedReason, PermissionDenied};
pub use entity::{EntityKind, EntityRef, COMMON_SITE};
pub use event::{EntityEvent, EntityEventAction, SystemEvent, SystemEventAction};
pub use ranking::{RankingError, RankingFailure};
