//! In-process backend with no I/O.

use crate::{BackendResult, EntityData, PermissionBackend, SiteInheritance};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sitegate_types::{EntityKind, EntityRef};
use std::collections::BTreeMap;

/// Registry name of [`MemoryBackend`].
pub const MEMORY_BACKEND: &str = "memory";

/// Every record held by a backend, in a serializable form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSnapshot {
    pub users: BTreeMap<String, EntityData>,
    pub groups: BTreeMap<String, EntityData>,
    pub site_inheritance: SiteInheritance,
}

impl BackendSnapshot {
    fn records(&self, kind: EntityKind) -> &BTreeMap<String, EntityData> {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Group => &self.groups,
        }
    }

    fn records_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, EntityData> {
        match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Group => &mut self.groups,
        }
    }
}

/// Keeps records in memory. `save` and `reload` are no-ops.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<BackendSnapshot>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: BackendSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Seeds the backend from a JSON document shaped like [`BackendSnapshot`].
    pub fn from_json(json: &str) -> BackendResult<Self> {
        let snapshot: BackendSnapshot = serde_json::from_str(json)?;
        Ok(Self::with_snapshot(snapshot))
    }

    /// Exports every record as pretty-printed JSON.
    pub fn to_json(&self) -> BackendResult<String> {
        Ok(serde_json::to_string_pretty(&*self.state.read())?)
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        self.state.read().clone()
    }
}

impl PermissionBackend for MemoryBackend {
    fn name(&self) -> &str {
        MEMORY_BACKEND
    }

    fn load(&self, entity: &EntityRef) -> BackendResult<Option<EntityData>> {
        Ok(self.state.read().records(entity.kind).get(&entity.name).cloned())
    }

    fn persist(&self, entity: &EntityRef, data: &EntityData) -> BackendResult<()> {
        self.state
            .write()
            .records_mut(entity.kind)
            .insert(entity.name.clone(), data.clone());
        Ok(())
    }

    fn remove(&self, entity: &EntityRef) -> BackendResult<()> {
        self.state.write().records_mut(entity.kind).remove(&entity.name);
        Ok(())
    }

    fn list_entities(&self, kind: EntityKind) -> BackendResult<Vec<String>> {
        Ok(self.state.read().records(kind).keys().cloned().collect())
    }

    fn load_site_inheritance(&self) -> BackendResult<SiteInheritance> {
        Ok(self.state.read().site_inheritance.clone())
    }

    fn persist_site_inheritance(&self, inheritance: &SiteInheritance) -> BackendResult<()> {
        self.state.write().site_inheritance = inheritance.clone();
        Ok(())
    }
}
