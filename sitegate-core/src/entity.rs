//! The entity proxy: a named user or group bound to its store.
//!
//! Reads go straight to the [`EntityStore`]. Every write is persisted
//! through the store first, then the resolution cache is dropped, then
//! exactly one [`EntityEvent`] is published. Observers therefore always see
//! the post-mutation state.

use crate::context::EngineContext;
use crate::error::PermissionsResult;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use sitegate_store::{EntityData, EntityStore};
use sitegate_types::{EntityEvent, EntityEventAction, EntityKind, EntityRef, COMMON_SITE};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A permission granted in memory until `expires_at`. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPermission {
    pub permission: String,
    pub site: String,
    pub expires_at: DateTime<Utc>,
}

/// A user or group. Obtain instances from the
/// [`PermissionManager`](crate::PermissionManager); the same name always
/// yields the same instance until the backend changes or the entity is
/// removed.
pub struct PermissionEntity {
    store: EntityStore,
    context: Arc<EngineContext>,
    timed: RwLock<Vec<TimedPermission>>,
}

impl PermissionEntity {
    pub(crate) fn new(store: EntityStore, context: Arc<EngineContext>) -> Self {
        Self {
            store,
            context,
            timed: RwLock::new(Vec::new()),
        }
    }

    // ── Identity ─────────────────────────────────────────────────

    pub fn entity_ref(&self) -> &EntityRef {
        self.store.entity()
    }

    pub fn name(&self) -> &str {
        &self.store.entity().name
    }

    pub fn kind(&self) -> EntityKind {
        self.store.entity().kind
    }

    pub fn is_group(&self) -> bool {
        self.kind() == EntityKind::Group
    }

    /// True once [`remove`](Self::remove) succeeded; the handle is stale.
    pub fn is_removed(&self) -> bool {
        self.store.is_removed()
    }

    /// True once the manager swapped or reloaded its backend; the handle
    /// is stale and writes fail.
    pub fn is_retired(&self) -> bool {
        self.store.is_retired()
    }

    pub(crate) fn retire(&self) {
        self.store.retire();
    }

    /// A copy of the raw stored record.
    pub fn data(&self) -> EntityData {
        self.store.snapshot()
    }

    // ── Permissions ──────────────────────────────────────────────

    /// Stored permissions: site-scoped first, then common. Not resolved.
    pub fn permissions(&self, site: &str) -> Vec<String> {
        self.store.permissions(site)
    }

    /// Permissions stored at exactly this scope.
    pub fn own_permissions(&self, site: &str) -> Vec<String> {
        self.store.read(|data| data.own_permissions(site).to_vec())
    }

    pub fn set_permissions(&self, permissions: Vec<String>, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::PermissionsChanged, |data| {
            data.set_permissions(permissions, site)
        })
    }

    /// Puts `permission` first in the scope's list (moving it if present).
    pub fn add_permission(&self, permission: &str, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::PermissionsChanged, |data| {
            let mut list = data.own_permissions(site).to_vec();
            list.retain(|p| p != permission);
            list.insert(0, permission.to_string());
            data.set_permissions(list, site);
        })
    }

    pub fn remove_permission(&self, permission: &str, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::PermissionsChanged, |data| {
            let mut list = data.own_permissions(site).to_vec();
            list.retain(|p| p != permission);
            data.set_permissions(list, site);
        })
    }

    // ── Prefix / suffix ──────────────────────────────────────────

    /// Stored prefix at exactly this site; empty if unset.
    pub fn prefix(&self, site: &str) -> String {
        self.store.prefix(site)
    }

    pub fn suffix(&self, site: &str) -> String {
        self.store.suffix(site)
    }

    pub fn set_prefix(&self, prefix: &str, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::InfoChanged, |data| data.set_prefix(prefix, site))
    }

    pub fn set_suffix(&self, suffix: &str, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::InfoChanged, |data| data.set_suffix(suffix, site))
    }

    // ── Options ──────────────────────────────────────────────────

    /// The option at exactly `site`, or `default`.
    pub fn option(&self, key: &str, site: &str, default: &str) -> String {
        self.store.option(key, site, default)
    }

    /// Sets one option, keeping the site's other options.
    pub fn set_option(&self, key: &str, value: &str, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::OptionsChanged, |data| {
            data.set_option(key, value, site)
        })
    }

    pub fn remove_option(&self, key: &str, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::OptionsChanged, |data| {
            data.remove_option(key, site);
        })
    }

    pub fn sites(&self) -> BTreeSet<String> {
        self.store.sites()
    }

    // ── Inheritance ──────────────────────────────────────────────

    /// Parent names stored at exactly this site.
    pub fn parent_names(&self, site: &str) -> Vec<String> {
        self.store.parent_names(site)
    }

    /// Parents at `site` followed by common parents, without duplicates.
    pub fn parent_group_names(&self, site: &str) -> Vec<String> {
        self.store.read(|data| {
            let mut names = data.parent_names(site);
            if site != COMMON_SITE {
                for name in data.parent_names(COMMON_SITE) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            names
        })
    }

    /// Replaces the parent set at `site` (groups for a user, inherited
    /// groups for a group).
    pub fn set_parents<I, S>(&self, parents: I, site: &str) -> PermissionsResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutate(EntityEventAction::InheritanceChanged, |data| {
            data.set_parents(parents, site)
        })
    }

    /// Parent replacement that reports a rank change instead of an
    /// inheritance change.
    pub(crate) fn set_parents_for_rank(&self, parents: Vec<String>, site: &str) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::RankChanged, |data| data.set_parents(parents, site))
    }

    // ── Group attributes ─────────────────────────────────────────

    pub fn weight(&self) -> i32 {
        self.store.read(|data| data.weight)
    }

    pub fn set_weight(&self, weight: i32) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::WeightChanged, |data| data.weight = weight)
    }

    /// 0 means unranked; 1 is the highest rank.
    pub fn rank(&self) -> u32 {
        self.store.read(|data| data.rank)
    }

    pub fn is_ranked(&self) -> bool {
        self.rank() > 0
    }

    pub fn set_rank(&self, rank: u32) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::RankChanged, |data| data.rank = rank)
    }

    /// The ladder this group sits on; `None` means the default ladder.
    pub fn rank_ladder(&self) -> Option<String> {
        self.store.read(|data| data.rank_ladder.clone())
    }

    pub fn set_rank_ladder(&self, ladder: Option<&str>) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::RankChanged, |data| {
            data.rank_ladder = ladder.map(str::to_string)
        })
    }

    pub fn is_default(&self, site: &str) -> bool {
        self.store.read(|data| data.is_default_at(site))
    }

    pub fn set_default(&self, site: &str, is_default: bool) -> PermissionsResult<()> {
        self.mutate(EntityEventAction::DefaultGroupChanged, |data| {
            data.set_default_at(site, is_default)
        })
    }

    // ── Timed permissions ────────────────────────────────────────

    /// Grants `permission` at `site` for `lifetime`. Held in memory only.
    pub fn add_timed_permission(
        &self,
        permission: &str,
        site: &str,
        lifetime: Duration,
    ) -> PermissionsResult<()> {
        let expires_at = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.add_timed_permission_until(permission, site, expires_at)
    }

    pub fn add_timed_permission_until(
        &self,
        permission: &str,
        site: &str,
        expires_at: DateTime<Utc>,
    ) -> PermissionsResult<()> {
        self.store.ensure_live()?;
        {
            let mut timed = self.timed.write();
            timed.retain(|t| !(t.permission == permission && t.site == site));
            timed.push(TimedPermission {
                permission: permission.to_string(),
                site: site.to_string(),
                expires_at,
            });
        }
        self.changed(EntityEventAction::PermissionsChanged);
        Ok(())
    }

    /// Returns false if no such grant was held or the handle is stale.
    pub fn remove_timed_permission(&self, permission: &str, site: &str) -> bool {
        if self.store.ensure_live().is_err() {
            return false;
        }
        let removed = {
            let mut timed = self.timed.write();
            let before = timed.len();
            timed.retain(|t| !(t.permission == permission && t.site == site));
            timed.len() != before
        };
        if removed {
            self.changed(EntityEventAction::PermissionsChanged);
        }
        removed
    }

    /// Unexpired timed grants at exactly `site`, most recent first.
    pub fn timed_permissions(&self, site: &str, now: DateTime<Utc>) -> Vec<TimedPermission> {
        self.timed
            .read()
            .iter()
            .rev()
            .filter(|t| t.site == site && t.expires_at > now)
            .cloned()
            .collect()
    }

    /// Drops expired timed grants. Publishes one
    /// `TIMEDPERMISSION_EXPIRED` if anything was dropped.
    pub fn expire_timed_permissions(&self, now: DateTime<Utc>) -> bool {
        if self.store.ensure_live().is_err() {
            return false;
        }
        let expired = {
            let mut timed = self.timed.write();
            let before = timed.len();
            timed.retain(|t| t.expires_at > now);
            timed.len() != before
        };
        if expired {
            debug!(entity = %self.entity_ref(), "timed permissions expired");
            self.changed(EntityEventAction::TimedPermissionExpired);
        }
        expired
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Flushes the record to the backend.
    pub fn save(&self) -> PermissionsResult<()> {
        self.store.save()?;
        self.changed(EntityEventAction::Saved);
        Ok(())
    }

    /// Deletes the record from the backend and clears it. This handle and
    /// any other clones become stale; fetch a fresh one from the manager.
    pub fn remove(&self) -> PermissionsResult<()> {
        self.store.remove()?;
        self.timed.write().clear();
        self.changed(EntityEventAction::Removed);
        Ok(())
    }

    fn mutate(
        &self,
        action: EntityEventAction,
        change: impl FnOnce(&mut EntityData),
    ) -> PermissionsResult<()> {
        self.store.update(change)?;
        self.changed(action);
        Ok(())
    }

    fn changed(&self, action: EntityEventAction) {
        self.context.cache.invalidate();
        self.context
            .events
            .publish_entity(&EntityEvent::new(self.entity_ref().clone(), action));
    }
}

impl std::fmt::Debug for PermissionEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEntity")
            .field("entity", self.entity_ref())
            .field("backend", &self.store.backend_name())
            .field("removed", &self.is_removed())
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}
