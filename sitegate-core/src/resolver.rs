//! Effective permission and prefix/suffix resolution over the parent graph.
//!
//! The walk is depth-first and pre-order: an entity's own data comes before
//! any ancestor's, and each parent's whole subtree is finished before the
//! next parent starts. Parents are taken site-scoped first, then from each
//! inherited site, then common; within one scope they are ordered by
//! ascending weight, then name. Each group is visited at most once per
//! walk, and the walk stops descending at the depth bound.

use crate::entity::PermissionEntity;
use chrono::{DateTime, Utc};
use sitegate_types::permission::base_name;
use sitegate_types::{EntityKind, COMMON_SITE};
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the resolver needs from its owner.
pub(crate) trait GroupSource {
    /// The group named `name`, if the backend knows it.
    fn find_group(&self, name: &str) -> Option<Arc<PermissionEntity>>;

    /// Groups used for users without any parent, in precedence order.
    fn default_groups(&self, site: &str) -> Vec<Arc<PermissionEntity>>;

    /// Transitive parent sites of `site`, nearest first; excludes `site`
    /// itself and the common scope.
    fn inherited_sites(&self, site: &str) -> Vec<String>;

    fn depth_limit(&self) -> usize;

    fn debug(&self) -> bool;
}

/// Outcome of a permission walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub permissions: Vec<String>,
    /// Earliest expiry among the timed grants folded in.
    pub valid_until: Option<DateTime<Utc>>,
}

/// The de-duplicated, precedence-ordered permission list of `root` at
/// `site`. A negation closer to `root` shadows a grant of the same node
/// further away.
pub(crate) fn effective_permissions(
    root: &PermissionEntity,
    site: &str,
    now: DateTime<Utc>,
    source: &impl GroupSource,
) -> Resolution {
    let scopes = scope_chain(site, source);
    let mut seen = HashSet::new();
    let mut resolution = Resolution::default();

    walk(root, &scopes, source, |entity| {
        let mut own = Vec::new();
        for scope in &scopes {
            for timed in entity.timed_permissions(scope, now) {
                resolution.valid_until = Some(match resolution.valid_until {
                    Some(until) => until.min(timed.expires_at),
                    None => timed.expires_at,
                });
                own.push(timed.permission);
            }
        }
        for scope in &scopes {
            own.extend(entity.own_permissions(scope));
        }

        for permission in own {
            if seen.insert(base_name(&permission).to_ascii_lowercase()) {
                resolution.permissions.push(permission);
            }
        }
        ControlFlow::Continue(())
    });

    if source.debug() {
        debug!(
            entity = %root.entity_ref(),
            site = %site,
            count = resolution.permissions.len(),
            "Resolved effective permissions"
        );
    }
    resolution
}

/// First non-empty prefix found walking from `root`. Each visited entity,
/// ancestors included, is checked at `site` and its inherited sites only;
/// common-scope prefixes are never used unless `site` is the common scope.
pub(crate) fn effective_prefix(
    root: &PermissionEntity,
    site: &str,
    source: &impl GroupSource,
) -> String {
    first_info(root, site, source, PermissionEntity::prefix)
}

pub(crate) fn effective_suffix(
    root: &PermissionEntity,
    site: &str,
    source: &impl GroupSource,
) -> String {
    first_info(root, site, source, PermissionEntity::suffix)
}

fn first_info(
    root: &PermissionEntity,
    site: &str,
    source: &impl GroupSource,
    read: fn(&PermissionEntity, &str) -> String,
) -> String {
    let scopes = scope_chain(site, source);
    let own_scopes: Vec<&String> = scopes
        .iter()
        .filter(|scope| site == COMMON_SITE || scope.as_str() != COMMON_SITE)
        .collect();

    let mut found = String::new();
    walk(root, &scopes, source, |entity| {
        for scope in &own_scopes {
            let value = read(entity, scope);
            if !value.is_empty() {
                found = value;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    });
    found
}

/// `site`, its inherited sites, then the common scope.
fn scope_chain(site: &str, source: &impl GroupSource) -> Vec<String> {
    let mut scopes = vec![site.to_string()];
    if site != COMMON_SITE {
        for inherited in source.inherited_sites(site) {
            if !scopes.contains(&inherited) {
                scopes.push(inherited);
            }
        }
        scopes.push(COMMON_SITE.to_string());
    }
    scopes
}

fn walk(
    root: &PermissionEntity,
    scopes: &[String],
    source: &impl GroupSource,
    mut visit: impl FnMut(&PermissionEntity) -> ControlFlow<()>,
) {
    let mut visited = HashSet::new();
    if root.kind() == EntityKind::Group {
        visited.insert(root.name().to_string());
    }
    let mut walker = Walker {
        scopes,
        source,
        limit: source.depth_limit(),
        visited,
    };
    let _ = walker.descend(root, 0, &mut visit);
}

struct Walker<'a, S> {
    scopes: &'a [String],
    source: &'a S,
    limit: usize,
    visited: HashSet<String>,
}

impl<S: GroupSource> Walker<'_, S> {
    fn descend(
        &mut self,
        entity: &PermissionEntity,
        depth: usize,
        visit: &mut impl FnMut(&PermissionEntity) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        visit(entity)?;

        let parents = self.parents_of(entity);
        if parents.is_empty() {
            return ControlFlow::Continue(());
        }
        if depth >= self.limit {
            warn!(
                entity = %entity.entity_ref(),
                depth,
                "Inheritance depth bound reached, treating as a cycle"
            );
            return ControlFlow::Continue(());
        }

        for parent in parents {
            if !self.visited.insert(parent.name().to_string()) {
                if self.source.debug() {
                    debug!(entity = %entity.entity_ref(), parent = %parent.name(), "Skipping visited group");
                }
                continue;
            }
            self.descend(&parent, depth + 1, visit)?;
        }
        ControlFlow::Continue(())
    }

    fn parents_of(&self, entity: &PermissionEntity) -> Vec<Arc<PermissionEntity>> {
        let mut names: Vec<String> = Vec::new();
        let mut parents = Vec::new();

        for scope in self.scopes {
            let mut segment = Vec::new();
            for name in entity.parent_names(scope) {
                if names.contains(&name) {
                    continue;
                }
                match self.source.find_group(&name) {
                    Some(group) => segment.push(group),
                    None => warn!(
                        entity = %entity.entity_ref(),
                        parent = %name,
                        site = %scope,
                        "Parent group not found, skipping"
                    ),
                }
                names.push(name);
            }
            sort_by_precedence(&mut segment);
            parents.extend(segment);
        }

        if names.is_empty() && entity.kind() == EntityKind::User {
            let site = self.scopes.first().map_or(COMMON_SITE, String::as_str);
            return self.source.default_groups(site);
        }
        parents
    }
}

/// Lower weight first; equal weights by name.
pub(crate) fn sort_by_precedence(groups: &mut [Arc<PermissionEntity>]) {
    groups.sort_by_cached_key(|group| (group.weight(), group.name().to_string()));
}
