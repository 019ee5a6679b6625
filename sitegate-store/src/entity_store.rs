//! Locked, backend-persisted wrapper around one [`EntityData`] record.

use crate::{EntityData, PermissionBackend, StoreError, StoreResult};
use parking_lot::{Mutex, RwLock};
use sitegate_types::EntityRef;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Holds and mutates the raw data of one named entity within one backend.
///
/// Writes are copy-on-write: the next record is built from a copy, persisted
/// through the backend, then swapped in. Readers therefore only ever see
/// complete, durable records, and backend I/O never happens under the
/// record lock. Writers are serialised by a separate per-entity mutex.
pub struct EntityStore {
    entity: EntityRef,
    backend: Arc<dyn PermissionBackend>,
    data: RwLock<EntityData>,
    write_lock: Mutex<()>,
    removed: AtomicBool,
    retired: AtomicBool,
}

impl EntityStore {
    pub fn new(entity: EntityRef, backend: Arc<dyn PermissionBackend>, data: EntityData) -> Self {
        Self {
            entity,
            backend,
            data: RwLock::new(data),
            write_lock: Mutex::new(()),
            removed: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        }
    }

    /// Loads the record from the backend; absent records start empty.
    pub fn load(entity: EntityRef, backend: Arc<dyn PermissionBackend>) -> StoreResult<Self> {
        let data = backend.load(&entity)?.unwrap_or_default();
        Ok(Self::new(entity, backend, data))
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Detaches the store from its backend. Reads keep returning the last
    /// record; writes, saves and removal fail with [`StoreError::Retired`].
    pub fn retire(&self) {
        let _writer = self.write_lock.lock();
        self.retired.store(true, Ordering::Release);
    }

    /// Fails if the store was removed or retired.
    pub fn ensure_live(&self) -> StoreResult<()> {
        if self.is_removed() {
            return Err(StoreError::Removed(self.entity.clone()));
        }
        if self.is_retired() {
            return Err(StoreError::Retired(self.entity.clone()));
        }
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Runs `f` against a consistent view of the record.
    pub fn read<R>(&self, f: impl FnOnce(&EntityData) -> R) -> R {
        let data = self.data.read();
        f(&*data)
    }

    /// A full copy of the current record.
    pub fn snapshot(&self) -> EntityData {
        self.data.read().clone()
    }

    /// Site-scoped permissions first, common permissions appended.
    pub fn permissions(&self, site: &str) -> Vec<String> {
        self.data.read().permissions(site)
    }

    pub fn prefix(&self, site: &str) -> String {
        self.data.read().prefix(site).to_string()
    }

    pub fn suffix(&self, site: &str) -> String {
        self.data.read().suffix(site).to_string()
    }

    /// The option at exactly `site`, or `default` if unset.
    pub fn option(&self, key: &str, site: &str, default: &str) -> String {
        self.data
            .read()
            .option(key, site)
            .unwrap_or(default)
            .to_string()
    }

    pub fn sites(&self) -> BTreeSet<String> {
        self.data.read().sites()
    }

    pub fn parent_names(&self, site: &str) -> Vec<String> {
        self.data.read().parent_names(site)
    }

    // ── Writes ───────────────────────────────────────────────────

    pub fn set_permissions(&self, permissions: Vec<String>, site: &str) -> StoreResult<()> {
        self.update(|data| data.set_permissions(permissions, site))
    }

    pub fn set_prefix(&self, prefix: &str, site: &str) -> StoreResult<()> {
        self.update(|data| data.set_prefix(prefix, site))
    }

    pub fn set_suffix(&self, suffix: &str, site: &str) -> StoreResult<()> {
        self.update(|data| data.set_suffix(suffix, site))
    }

    pub fn set_option(&self, key: &str, value: &str, site: &str) -> StoreResult<()> {
        self.update(|data| data.set_option(key, value, site))
    }

    pub fn remove_option(&self, key: &str, site: &str) -> StoreResult<()> {
        self.update(|data| {
            data.remove_option(key, site);
        })
    }

    pub fn set_parents<I, S>(&self, parents: I, site: &str) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update(|data| data.set_parents(parents, site))
    }

    /// Applies an arbitrary change, persists it, then publishes it.
    ///
    /// On a backend failure the in-memory record is left untouched.
    pub fn update(&self, change: impl FnOnce(&mut EntityData)) -> StoreResult<()> {
        let _writer = self.write_lock.lock();
        self.ensure_live()?;

        let mut next = self.data.read().clone();
        change(&mut next);
        self.backend.persist(&self.entity, &next)?;
        *self.data.write() = next;

        debug!(entity = %self.entity, backend = self.backend.name(), "entity record persisted");
        Ok(())
    }

    /// Flushes the current record to the backend. Safe to call repeatedly.
    pub fn save(&self) -> StoreResult<()> {
        let _writer = self.write_lock.lock();
        self.ensure_live()?;
        let current = self.data.read().clone();
        self.backend.persist(&self.entity, &current)?;
        Ok(())
    }

    /// Deletes the record from the backend and clears every map.
    ///
    /// The store is unusable afterwards; later writes fail with
    /// [`StoreError::Removed`].
    pub fn remove(&self) -> StoreResult<()> {
        let _writer = self.write_lock.lock();
        self.ensure_live()?;
        self.backend.remove(&self.entity)?;
        *self.data.write() = EntityData::default();
        self.removed.store(true, Ordering::Release);

        debug!(entity = %self.entity, backend = self.backend.name(), "entity record removed");
        Ok(())
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entity", &self.entity)
            .field("backend", &self.backend.name())
            .field("removed", &self.is_removed())
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}
