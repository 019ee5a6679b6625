//! Entity identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Site name denoting the common (site-independent) scope.
pub const COMMON_SITE: &str = "";

/// The two variants of a permission entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A user; its parents are group memberships.
    User,
    /// A group; its parents are inherited groups.
    Group,
}

impl EntityKind {
    /// Returns the lowercase name used in logs and serialized records.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an entity: its kind plus its unique, immutable name.
///
/// Users and groups live in separate namespaces, so a user and a group may
/// share a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a user reference.
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(EntityKind::User, name)
    }

    /// Shorthand for a group reference.
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Group, name)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}
