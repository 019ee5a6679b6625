//! Permission resolution engine for sitegate.
//!
//! Users and groups carry permissions, options, prefixes and parent groups,
//! each either common to every site or scoped to one site. The engine
//! answers "does this entity hold this permission here?" by walking the
//! parent graph, and notifies observers whenever an entity changes.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Manager**: [`PermissionManager`], the entry point. Owns the backend,
//!   the identity maps and the resolution cache.
//! - **Entities**: [`PermissionEntity`], one per user or group name, reads
//!   and writes through its store and publishes one event per mutation.
//! - **Resolver**: depth-first, cycle-guarded walk producing effective
//!   permissions and prefix/suffix.
//! - **Events**: [`EventBus`], synchronous typed publish/subscribe.
//! - **Ranking**: ladders of ranked groups with promote/demote.
//!
//! # Example
//!
//! ```
//! use sitegate_core::PermissionManager;
//! use sitegate_types::EntityRef;
//!
//! let manager = PermissionManager::in_memory();
//! let mods = EntityRef::group("mods");
//! manager.set_permissions(&mods, vec!["post.delete".into()], "").unwrap();
//!
//! let alice = EntityRef::user("alice");
//! manager.set_parents(&alice, vec!["mods".into()], "example.com").unwrap();
//!
//! assert!(manager.has_permission(&alice, "post.delete", "example.com").unwrap());
//! ```

mod cache;
mod config;
mod context;
mod entity;
mod error;
mod events;
mod manager;
mod ranking;
mod registry;
mod resolver;

pub use cache::ResolutionCache;
pub use config::{ConfigError, ConfigResult, ManagerConfig, CONFIG_FILE, DEFAULT_LADDER};
pub use entity::{PermissionEntity, TimedPermission};
pub use error::{PermissionsError, PermissionsResult};
pub use events::{EventBus, SubscriptionId};
pub use manager::PermissionManager;
pub use registry::{BackendFactory, BackendRegistry};
