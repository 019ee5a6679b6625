use crate::{BackendResult, EntityData};
use sitegate_types::{EntityKind, EntityRef};
use std::collections::BTreeMap;

/// Site name → ordered list of sites it inherits from.
pub type SiteInheritance = BTreeMap<String, Vec<String>>;

/// Storage contract the engine depends on.
///
/// Implementations perform their own I/O; the engine never calls them while
/// holding an entity's read/write lock.
pub trait PermissionBackend: Send + Sync {
    /// Registry name of this backend (e.g. `"memory"`).
    fn name(&self) -> &str;

    /// Loads the stored record, or `None` if the entity was never persisted.
    fn load(&self, entity: &EntityRef) -> BackendResult<Option<EntityData>>;

    /// Writes the full record, replacing any previous one.
    fn persist(&self, entity: &EntityRef, data: &EntityData) -> BackendResult<()>;

    /// Physically deletes the record. Removing an unknown entity is not an error.
    fn remove(&self, entity: &EntityRef) -> BackendResult<()>;

    /// Names of every persisted entity of the given kind.
    fn list_entities(&self, kind: EntityKind) -> BackendResult<Vec<String>>;

    fn load_site_inheritance(&self) -> BackendResult<SiteInheritance> {
        Ok(SiteInheritance::new())
    }

    fn persist_site_inheritance(&self, inheritance: &SiteInheritance) -> BackendResult<()> {
        let _ = inheritance;
        Ok(())
    }

    /// Re-reads backing storage. A no-op for backends without external state.
    fn reload(&self) -> BackendResult<()> {
        Ok(())
    }
}
