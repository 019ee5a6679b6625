//! Lifecycle events emitted by the engine.
//!
//! Entity events describe a mutation of a single user or group and are
//! emitted after the mutation has been applied to the store. System events
//! describe manager-wide changes (backend swap, reload, debug toggle).

use crate::EntityRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What changed on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityEventAction {
    PermissionsChanged,
    OptionsChanged,
    InheritanceChanged,
    /// Prefix or suffix changed.
    InfoChanged,
    #[serde(rename = "TIMEDPERMISSION_EXPIRED")]
    TimedPermissionExpired,
    RankChanged,
    #[serde(rename = "DEFAULTGROUP_CHANGED")]
    DefaultGroupChanged,
    WeightChanged,
    Saved,
    Removed,
}

impl EntityEventAction {
    /// Every entity action, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::PermissionsChanged,
        Self::OptionsChanged,
        Self::InheritanceChanged,
        Self::InfoChanged,
        Self::TimedPermissionExpired,
        Self::RankChanged,
        Self::DefaultGroupChanged,
        Self::WeightChanged,
        Self::Saved,
        Self::Removed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionsChanged => "PERMISSIONS_CHANGED",
            Self::OptionsChanged => "OPTIONS_CHANGED",
            Self::InheritanceChanged => "INHERITANCE_CHANGED",
            Self::InfoChanged => "INFO_CHANGED",
            Self::TimedPermissionExpired => "TIMEDPERMISSION_EXPIRED",
            Self::RankChanged => "RANK_CHANGED",
            Self::DefaultGroupChanged => "DEFAULTGROUP_CHANGED",
            Self::WeightChanged => "WEIGHT_CHANGED",
            Self::Saved => "SAVED",
            Self::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for EntityEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What changed manager-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemEventAction {
    BackendChanged,
    Reloaded,
    /// Site inheritance changed. The wire name keeps the historical "world".
    #[serde(rename = "WORLDINHERITANCE_CHANGED")]
    SiteInheritanceChanged,
    #[serde(rename = "DEFAULTGROUP_CHANGED")]
    DefaultGroupChanged,
    #[serde(rename = "DEBUGMODE_TOGGLE")]
    DebugModeToggle,
    ReinjectPermissibles,
}

impl SystemEventAction {
    /// Every system action, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::BackendChanged,
        Self::Reloaded,
        Self::SiteInheritanceChanged,
        Self::DefaultGroupChanged,
        Self::DebugModeToggle,
        Self::ReinjectPermissibles,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BackendChanged => "BACKEND_CHANGED",
            Self::Reloaded => "RELOADED",
            Self::SiteInheritanceChanged => "WORLDINHERITANCE_CHANGED",
            Self::DefaultGroupChanged => "DEFAULTGROUP_CHANGED",
            Self::DebugModeToggle => "DEBUGMODE_TOGGLE",
            Self::ReinjectPermissibles => "REINJECT_PERMISSIBLES",
        }
    }
}

impl fmt::Display for SystemEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub entity: EntityRef,
    pub action: EntityEventAction,
}

impl EntityEvent {
    pub fn new(entity: EntityRef, action: EntityEventAction) -> Self {
        Self { entity, action }
    }
}

/// A manager-wide change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub action: SystemEventAction,
    /// Free-form context, e.g. the new backend name or the affected site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SystemEvent {
    pub fn new(action: SystemEventAction) -> Self {
        Self {
            action,
            detail: None,
        }
    }

    pub fn with_detail(action: SystemEventAction, detail: impl Into<String>) -> Self {
        Self {
            action,
            detail: Some(detail.into()),
        }
    }
}
