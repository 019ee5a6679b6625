//! The raw entity record.

use serde::{Deserialize, Serialize};
use sitegate_types::COMMON_SITE;
use std::collections::{BTreeMap, BTreeSet};

/// Everything stored for one user or group.
///
/// The empty site name ([`COMMON_SITE`]) is the common scope. Permissions
/// for the common scope live in `common_permissions`; every other map is
/// keyed by site name directly, including the common scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityData {
    pub common_permissions: Vec<String>,
    pub site_permissions: BTreeMap<String, Vec<String>>,
    pub prefixes: BTreeMap<String, String>,
    pub suffixes: BTreeMap<String, String>,
    pub options: BTreeMap<String, BTreeMap<String, String>>,
    pub parents: BTreeMap<String, BTreeSet<String>>,

    // Group-only attributes. Users keep the defaults.
    /// Inheritance precedence; lower weight wins.
    pub weight: i32,
    /// Position on the rank ladder; 0 means unranked, 1 is the highest rank.
    pub rank: u32,
    /// Ladder name; `None` means the configured default ladder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_ladder: Option<String>,
    /// Sites at which this group is a default group.
    pub default_sites: BTreeSet<String>,
}

impl EntityData {
    /// Site-scoped permissions followed by common permissions.
    ///
    /// Duplicates are kept; deduplication is the resolver's job.
    pub fn permissions(&self, site: &str) -> Vec<String> {
        let mut result = Vec::new();
        if site != COMMON_SITE {
            if let Some(scoped) = self.site_permissions.get(site) {
                result.extend(scoped.iter().cloned());
            }
        }
        result.extend(self.common_permissions.iter().cloned());
        result
    }

    /// Replaces the common list when `site` is empty, otherwise the site list.
    pub fn set_permissions(&mut self, permissions: Vec<String>, site: &str) {
        if site == COMMON_SITE {
            self.common_permissions = permissions;
        } else if permissions.is_empty() {
            self.site_permissions.remove(site);
        } else {
            self.site_permissions.insert(site.to_string(), permissions);
        }
    }

    /// Only the permissions stored at exactly this scope.
    pub fn own_permissions(&self, site: &str) -> &[String] {
        if site == COMMON_SITE {
            &self.common_permissions
        } else {
            self.site_permissions
                .get(site)
                .map(Vec::as_slice)
                .unwrap_or_default()
        }
    }

    pub fn prefix(&self, site: &str) -> &str {
        self.prefixes.get(site).map(String::as_str).unwrap_or_default()
    }

    pub fn suffix(&self, site: &str) -> &str {
        self.suffixes.get(site).map(String::as_str).unwrap_or_default()
    }

    pub fn set_prefix(&mut self, prefix: &str, site: &str) {
        set_or_clear(&mut self.prefixes, prefix, site);
    }

    pub fn set_suffix(&mut self, suffix: &str, site: &str) {
        set_or_clear(&mut self.suffixes, suffix, site);
    }

    /// The option value at exactly this site. There is no fallback to the
    /// common scope.
    pub fn option(&self, key: &str, site: &str) -> Option<&str> {
        self.options
            .get(site)
            .and_then(|options| options.get(key))
            .map(String::as_str)
    }

    /// Merges one option into the site's option map, keeping the others.
    pub fn set_option(&mut self, key: &str, value: &str, site: &str) {
        self.options
            .entry(site.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Drops one option; drops the site's map once it is empty.
    pub fn remove_option(&mut self, key: &str, site: &str) -> bool {
        let Some(options) = self.options.get_mut(site) else {
            return false;
        };
        let removed = options.remove(key).is_some();
        if options.is_empty() {
            self.options.remove(site);
        }
        removed
    }

    /// Sites present in the option or permission maps.
    pub fn sites(&self) -> BTreeSet<String> {
        self.options
            .keys()
            .chain(self.site_permissions.keys())
            .cloned()
            .collect()
    }

    /// Parent names stored at exactly this site, sorted by name.
    pub fn parent_names(&self, site: &str) -> Vec<String> {
        self.parents
            .get(site)
            .map(|parents| parents.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces the parent set at this site; duplicates collapse.
    pub fn set_parents<I, S>(&mut self, parents: I, site: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parents: BTreeSet<String> = parents.into_iter().map(Into::into).collect();
        if parents.is_empty() {
            self.parents.remove(site);
        } else {
            self.parents.insert(site.to_string(), parents);
        }
    }

    /// Every site with a parent set, including the common scope.
    pub fn parent_sites(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    pub fn is_default_at(&self, site: &str) -> bool {
        self.default_sites.contains(site)
    }

    pub fn set_default_at(&mut self, site: &str, is_default: bool) {
        if is_default {
            self.default_sites.insert(site.to_string());
        } else {
            self.default_sites.remove(site);
        }
    }

    /// True if nothing has ever been set on this record.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn set_or_clear(map: &mut BTreeMap<String, String>, value: &str, site: &str) {
    if value.is_empty() {
        map.remove(site);
    } else {
        map.insert(site.to_string(), value.to_string());
    }
}
