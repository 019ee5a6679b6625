//! The manager: identity maps, backend ownership and the query surface.

use crate::config::ManagerConfig;
use crate::context::EngineContext;
use crate::entity::PermissionEntity;
use crate::error::PermissionsResult;
use crate::events::EventBus;
use crate::registry::BackendRegistry;
use crate::resolver::{self, GroupSource};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sitegate_store::{
    EntityData, EntityStore, MemoryBackend, PermissionBackend, SiteInheritance,
};
use sitegate_types::permission::evaluate;
use sitegate_types::{
    EntityEventAction, EntityKind, EntityRef, PermissionDenied, SystemEvent, SystemEventAction,
    COMMON_SITE,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

type IdentityMap = RwLock<HashMap<String, Arc<PermissionEntity>>>;

/// Entry point for fetching entities and answering permission queries.
///
/// Cloning is cheap and every clone shares the same state. Entities are
/// created lazily on first access; the same name yields the same instance
/// until the entity is removed, the backend is swapped, or the manager
/// reloads.
#[derive(Clone)]
pub struct PermissionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ManagerConfig,
    context: Arc<EngineContext>,
    backend: RwLock<Arc<dyn PermissionBackend>>,
    users: IdentityMap,
    groups: IdentityMap,
    site_inheritance: RwLock<SiteInheritance>,
    site_write: Mutex<()>,
    debug: AtomicBool,
}

impl PermissionManager {
    pub fn new(
        backend: Arc<dyn PermissionBackend>,
        config: ManagerConfig,
    ) -> PermissionsResult<Self> {
        let site_inheritance = merged_site_inheritance(backend.as_ref(), &config)?;
        info!(backend = %backend.name(), debug = config.debug, "Permission manager started");
        Ok(Self::build(backend, config, site_inheritance))
    }

    /// A manager over a fresh [`MemoryBackend`] with default configuration.
    pub fn in_memory() -> Self {
        Self::build(
            Arc::new(MemoryBackend::new()),
            ManagerConfig::default(),
            SiteInheritance::new(),
        )
    }

    fn build(
        backend: Arc<dyn PermissionBackend>,
        config: ManagerConfig,
        site_inheritance: SiteInheritance,
    ) -> Self {
        let inner = Arc::new(ManagerInner {
            debug: AtomicBool::new(config.debug),
            config,
            context: Arc::new(EngineContext::default()),
            backend: RwLock::new(backend),
            users: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            site_inheritance: RwLock::new(site_inheritance),
            site_write: Mutex::new(()),
        });

        // Removed entities leave the identity map before other observers run.
        let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
        inner
            .context
            .events
            .on_entity(EntityEventAction::Removed, move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.evict(&event.entity);
                }
            });

        Self { inner }
    }

    /// Builds the backend named in `config` through `registry`.
    pub fn from_config(config: ManagerConfig, registry: &BackendRegistry) -> PermissionsResult<Self> {
        let backend = registry.create(&config)?;
        Self::new(backend, config)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Subscribe here for entity and system events.
    pub fn events(&self) -> &EventBus {
        &self.inner.context.events
    }

    pub fn backend_name(&self) -> String {
        self.inner.backend.read().name().to_string()
    }

    // ── Entities ─────────────────────────────────────────────────

    /// The user named `name`, created empty if the backend has no record.
    pub fn user(&self, name: &str) -> PermissionsResult<Arc<PermissionEntity>> {
        self.inner.materialize(EntityRef::user(name))
    }

    /// The group named `name`, created empty if the backend has no record.
    pub fn group(&self, name: &str) -> PermissionsResult<Arc<PermissionEntity>> {
        self.inner.materialize(EntityRef::group(name))
    }

    pub fn entity(&self, entity: &EntityRef) -> PermissionsResult<Arc<PermissionEntity>> {
        self.inner.materialize(entity.clone())
    }

    /// Every user known to the backend or materialised here, sorted.
    pub fn user_names(&self) -> PermissionsResult<Vec<String>> {
        self.inner.names(EntityKind::User)
    }

    pub fn group_names(&self) -> PermissionsResult<Vec<String>> {
        self.inner.names(EntityKind::Group)
    }

    /// Every known group, in precedence order.
    pub fn groups(&self) -> PermissionsResult<Vec<Arc<PermissionEntity>>> {
        let mut groups = self
            .group_names()?
            .iter()
            .map(|name| self.group(name))
            .collect::<PermissionsResult<Vec<_>>>()?;
        resolver::sort_by_precedence(&mut groups);
        Ok(groups)
    }

    /// Deletes the user's record; previously returned handles go stale.
    pub fn remove_user(&self, name: &str) -> PermissionsResult<()> {
        self.user(name)?.remove()
    }

    pub fn remove_group(&self, name: &str) -> PermissionsResult<()> {
        self.group(name)?.remove()
    }

    // ── Queries ──────────────────────────────────────────────────

    /// True if the entity's effective permissions at `site` grant
    /// `permission`. The first covering entry decides; a negated entry
    /// denies.
    pub fn has_permission(
        &self,
        entity: &EntityRef,
        permission: &str,
        site: &str,
    ) -> PermissionsResult<bool> {
        let effective = self.resolved(entity, site)?;
        let granted =
            evaluate(effective.iter().map(String::as_str), permission).unwrap_or(false);
        if self.is_debug() {
            debug!(entity = %entity, permission, site, granted, "Permission check");
        }
        Ok(granted)
    }

    /// Fails with a `DENIED` reason naming `permission` unless the user
    /// holds it at `site`.
    pub fn check_permission(&self, user: &str, permission: &str, site: &str) -> PermissionsResult<()> {
        if self.has_permission(&EntityRef::user(user), permission, site)? {
            return Ok(());
        }
        debug!(user, permission, site, "Permission denied");
        Err(PermissionDenied::missing(permission).into())
    }

    /// Own, inherited-site and ancestor permissions, de-duplicated with the
    /// closest occurrence kept.
    pub fn effective_permissions(&self, entity: &EntityRef, site: &str) -> PermissionsResult<Vec<String>> {
        Ok(self.resolved(entity, site)?.as_ref().clone())
    }

    /// Stored permissions only: site-scoped first, then common.
    pub fn permissions(&self, entity: &EntityRef, site: &str) -> PermissionsResult<Vec<String>> {
        Ok(self.entity(entity)?.permissions(site))
    }

    /// Stored prefix at exactly `site`.
    pub fn prefix(&self, entity: &EntityRef, site: &str) -> PermissionsResult<String> {
        Ok(self.entity(entity)?.prefix(site))
    }

    pub fn suffix(&self, entity: &EntityRef, site: &str) -> PermissionsResult<String> {
        Ok(self.entity(entity)?.suffix(site))
    }

    /// The first prefix found on the entity (at `site` or an inherited site)
    /// or, failing that, on its ancestors in precedence order.
    pub fn effective_prefix(&self, entity: &EntityRef, site: &str) -> PermissionsResult<String> {
        let root = self.entity(entity)?;
        Ok(resolver::effective_prefix(&root, site, self.inner.as_ref()))
    }

    pub fn effective_suffix(&self, entity: &EntityRef, site: &str) -> PermissionsResult<String> {
        let root = self.entity(entity)?;
        Ok(resolver::effective_suffix(&root, site, self.inner.as_ref()))
    }

    pub fn option(
        &self,
        entity: &EntityRef,
        key: &str,
        site: &str,
        default: &str,
    ) -> PermissionsResult<String> {
        Ok(self.entity(entity)?.option(key, site, default))
    }

    fn resolved(&self, entity: &EntityRef, site: &str) -> PermissionsResult<Arc<Vec<String>>> {
        let now = Utc::now();
        let cache = &self.inner.context.cache;
        if let Some(hit) = cache.get(entity, site, now) {
            return Ok(hit);
        }

        let generation = cache.generation();
        let root = self.entity(entity)?;
        let resolution = resolver::effective_permissions(&root, site, now, self.inner.as_ref());
        let permissions = Arc::new(resolution.permissions);
        cache.insert(generation, entity, site, permissions.clone(), resolution.valid_until);
        Ok(permissions)
    }

    // ── Mutations ────────────────────────────────────────────────

    pub fn set_permissions(
        &self,
        entity: &EntityRef,
        permissions: Vec<String>,
        site: &str,
    ) -> PermissionsResult<()> {
        self.entity(entity)?.set_permissions(permissions, site)
    }

    pub fn set_option(&self, entity: &EntityRef, key: &str, value: &str, site: &str) -> PermissionsResult<()> {
        self.entity(entity)?.set_option(key, value, site)
    }

    pub fn set_prefix(&self, entity: &EntityRef, prefix: &str, site: &str) -> PermissionsResult<()> {
        self.entity(entity)?.set_prefix(prefix, site)
    }

    pub fn set_suffix(&self, entity: &EntityRef, suffix: &str, site: &str) -> PermissionsResult<()> {
        self.entity(entity)?.set_suffix(suffix, site)
    }

    pub fn set_parents(&self, entity: &EntityRef, parents: Vec<String>, site: &str) -> PermissionsResult<()> {
        self.entity(entity)?.set_parents(parents, site)
    }

    // ── Sites ────────────────────────────────────────────────────

    /// Direct parent sites of `site`.
    pub fn site_inheritance(&self, site: &str) -> Vec<String> {
        self.inner
            .site_inheritance
            .read()
            .get(site)
            .cloned()
            .unwrap_or_default()
    }

    /// Transitive parent sites of `site`, nearest first, without cycles.
    pub fn inherited_sites(&self, site: &str) -> Vec<String> {
        self.inner.flatten_sites(site)
    }

    /// Replaces the parent sites of `site`; an empty list clears them.
    pub fn set_site_inheritance<I, S>(&self, site: &str, parents: I) -> PermissionsResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parents: Vec<String> = parents
            .into_iter()
            .map(Into::into)
            .filter(|parent| parent != site && parent != COMMON_SITE)
            .collect();

        {
            let _sites = self.inner.site_write.lock();
            // Held so a swap or reload cannot replace the map mid-write.
            let backend = self.inner.backend.read();
            let mut next = self.inner.site_inheritance.read().clone();
            if parents.is_empty() {
                next.remove(site);
            } else {
                next.insert(site.to_string(), parents);
            }
            backend.persist_site_inheritance(&next)?;
            *self.inner.site_inheritance.write() = next;
        }

        self.inner.context.cache.invalidate();
        self.publish(SystemEvent::with_detail(
            SystemEventAction::SiteInheritanceChanged,
            site,
        ));
        Ok(())
    }

    // ── Default groups ───────────────────────────────────────────

    /// Groups flagged default at `site` or at the common scope, in
    /// precedence order. Users without parents inherit from these.
    pub fn default_groups(&self, site: &str) -> PermissionsResult<Vec<Arc<PermissionEntity>>> {
        Ok(self
            .groups()?
            .into_iter()
            .filter(|group| group.is_default(site) || group.is_default(COMMON_SITE))
            .collect())
    }

    pub fn set_default_group(&self, group: &str, site: &str, is_default: bool) -> PermissionsResult<()> {
        self.group(group)?.set_default(site, is_default)?;
        self.publish(SystemEvent::with_detail(
            SystemEventAction::DefaultGroupChanged,
            group,
        ));
        Ok(())
    }

    // ── Timed permissions ────────────────────────────────────────

    /// Drops expired timed grants from every materialised entity. Returns
    /// how many entities lost at least one grant.
    pub fn expire_timed_permissions(&self, now: DateTime<Utc>) -> usize {
        self.inner
            .materialised()
            .iter()
            .filter(|entity| entity.expire_timed_permissions(now))
            .count()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn is_debug(&self) -> bool {
        self.inner.debug.load(Ordering::Relaxed)
    }

    /// Toggles resolution logging. Results are unaffected.
    pub fn set_debug(&self, enabled: bool) {
        let previous = self.inner.debug.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            info!(enabled, "Permission debug mode toggled");
            self.publish(SystemEvent::with_detail(
                SystemEventAction::DebugModeToggle,
                if enabled { "on" } else { "off" },
            ));
        }
    }

    /// Saves every materialised entity.
    pub fn save(&self) -> PermissionsResult<()> {
        for entity in self.inner.materialised() {
            entity.save()?;
        }
        Ok(())
    }

    /// Re-reads the backend and drops every cached entity and result.
    pub fn reload(&self) -> PermissionsResult<()> {
        {
            let _sites = self.inner.site_write.lock();
            let backend = self.inner.backend.write();
            backend.reload()?;
            let site_inheritance = merged_site_inheritance(backend.as_ref(), &self.inner.config)?;
            self.inner.reset(site_inheritance);
        }
        info!(backend = %self.backend_name(), "Permissions reloaded");
        self.publish(SystemEvent::new(SystemEventAction::Reloaded));
        Ok(())
    }

    /// Switches to `backend`. Every previously returned entity handle is
    /// stale afterwards.
    pub fn set_backend(&self, backend: Arc<dyn PermissionBackend>) -> PermissionsResult<()> {
        let name = backend.name().to_string();
        {
            let site_inheritance = merged_site_inheritance(backend.as_ref(), &self.inner.config)?;
            let _sites = self.inner.site_write.lock();
            let mut current = self.inner.backend.write();
            *current = backend;
            self.inner.reset(site_inheritance);
        }
        info!(backend = %name, "Permission backend changed");
        self.publish(SystemEvent::with_detail(SystemEventAction::BackendChanged, name));
        Ok(())
    }

    /// Asks session integrators to rebuild their per-session caches.
    pub fn request_reinject(&self) {
        self.publish(SystemEvent::new(SystemEventAction::ReinjectPermissibles));
    }

    fn publish(&self, event: SystemEvent) {
        self.inner.context.events.publish_system(&event);
    }
}

impl std::fmt::Debug for PermissionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionManager")
            .field("backend", &self.backend_name())
            .field("users", &self.inner.users.read().len())
            .field("groups", &self.inner.groups.read().len())
            .field("debug", &self.is_debug())
            .finish()
    }
}

impl ManagerInner {
    fn map(&self, kind: EntityKind) -> &IdentityMap {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Group => &self.groups,
        }
    }

    fn cached(&self, entity: &EntityRef) -> Option<Arc<PermissionEntity>> {
        self.map(entity.kind).read().get(&entity.name).cloned()
    }

    /// Returns the cached instance or loads one, empty if the backend has
    /// no record.
    fn materialize(&self, entity: EntityRef) -> PermissionsResult<Arc<PermissionEntity>> {
        if let Some(found) = self.cached(&entity) {
            return Ok(found);
        }

        // Held from load to insertion so a swap cannot interleave.
        let backend = self.backend.read();
        let data = backend.load(&entity)?.unwrap_or_default();
        Ok(self.bind(&backend, entity, data))
    }

    /// Wraps `data` loaded from `backend` and publishes it in the identity
    /// map. Caller holds the backend read lock `backend` came from.
    fn bind(
        &self,
        backend: &Arc<dyn PermissionBackend>,
        entity: EntityRef,
        data: EntityData,
    ) -> Arc<PermissionEntity> {
        let store = EntityStore::new(entity.clone(), backend.clone(), data);
        let created = Arc::new(PermissionEntity::new(store, self.context.clone()));
        let mut map = self.map(entity.kind).write();
        map.entry(entity.name).or_insert(created).clone()
    }

    fn evict(&self, entity: &EntityRef) {
        let mut map = self.map(entity.kind).write();
        if map.get(&entity.name).is_some_and(|found| found.is_removed()) {
            map.remove(&entity.name);
            debug!(entity = %entity, "Evicted removed entity");
        }
    }

    fn names(&self, kind: EntityKind) -> PermissionsResult<Vec<String>> {
        let listed = self.backend.read().list_entities(kind)?;
        let mut names: BTreeSet<String> = listed.into_iter().collect();
        names.extend(self.map(kind).read().keys().cloned());
        Ok(names.into_iter().collect())
    }

    fn materialised(&self) -> Vec<Arc<PermissionEntity>> {
        let mut all: Vec<_> = self.users.read().values().cloned().collect();
        all.extend(self.groups.read().values().cloned());
        all
    }

    /// Retires every handed-out entity and drops identity maps and cached
    /// results. Caller holds `site_write` and the backend write lock.
    fn reset(&self, site_inheritance: SiteInheritance) {
        for map in [&self.users, &self.groups] {
            for (_, entity) in map.write().drain() {
                entity.retire();
            }
        }
        *self.site_inheritance.write() = site_inheritance;
        self.context.cache.invalidate();
    }

    fn flatten_sites(&self, site: &str) -> Vec<String> {
        let inheritance = self.site_inheritance.read();
        let mut seen: HashSet<&str> = HashSet::from([site, COMMON_SITE]);
        let mut chain = Vec::new();
        let mut stack: Vec<&str> = inheritance
            .get(site)
            .map(|parents| parents.iter().rev().map(String::as_str).collect())
            .unwrap_or_default();

        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            chain.push(next.to_string());
            if let Some(parents) = inheritance.get(next) {
                stack.extend(parents.iter().rev().map(String::as_str));
            }
        }
        chain
    }
}

impl GroupSource for ManagerInner {
    fn find_group(&self, name: &str) -> Option<Arc<PermissionEntity>> {
        let entity = EntityRef::group(name);
        if let Some(found) = self.cached(&entity) {
            return Some(found);
        }

        let backend = self.backend.read();
        match backend.load(&entity) {
            Ok(Some(data)) => Some(self.bind(&backend, entity, data)),
            Ok(None) => None,
            Err(error) => {
                warn!(group = %name, %error, "Backend failed to load parent group");
                None
            }
        }
    }

    fn default_groups(&self, site: &str) -> Vec<Arc<PermissionEntity>> {
        let names = match self.names(EntityKind::Group) {
            Ok(names) => names,
            Err(error) => {
                warn!(%error, "Backend failed to list groups");
                return Vec::new();
            }
        };
        let mut defaults: Vec<_> = names
            .iter()
            .filter_map(|name| self.find_group(name))
            .filter(|group| group.is_default(site) || group.is_default(COMMON_SITE))
            .collect();
        resolver::sort_by_precedence(&mut defaults);
        defaults
    }

    fn inherited_sites(&self, site: &str) -> Vec<String> {
        self.flatten_sites(site)
    }

    fn depth_limit(&self) -> usize {
        if let Some(limit) = self.config.max_resolution_depth {
            return limit;
        }
        let listed = self
            .backend
            .read()
            .list_entities(EntityKind::Group)
            .map_or(0, |names| names.len());
        listed.max(self.groups.read().len()) + 1
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}

/// Backend site inheritance, with configured entries filling sites the
/// backend has nothing for.
fn merged_site_inheritance(
    backend: &dyn PermissionBackend,
    config: &ManagerConfig,
) -> PermissionsResult<SiteInheritance> {
    let mut inheritance = backend.load_site_inheritance()?;
    for (site, parents) in &config.site_inheritance {
        inheritance
            .entry(site.clone())
            .or_insert_with(|| parents.clone());
    }
    Ok(inheritance)
}
