use pretty_assertions::assert_eq;
use sitegate_store::{
    BackendError, BackendResult, EntityData, EntityStore, MemoryBackend, PermissionBackend,
    StoreError,
};
use sitegate_types::{EntityKind, EntityRef};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn store(name: &str) -> (EntityStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = EntityStore::new(EntityRef::group(name), backend.clone(), EntityData::default());
    (store, backend)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Backend whose writes can be switched to fail.
#[derive(Default)]
struct FlakyBackend {
    inner: MemoryBackend,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl PermissionBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn load(&self, entity: &EntityRef) -> BackendResult<Option<EntityData>> {
        self.inner.load(entity)
    }

    fn persist(&self, entity: &EntityRef, data: &EntityData) -> BackendResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("disk full".into()));
        }
        self.inner.persist(entity, data)
    }

    fn remove(&self, entity: &EntityRef) -> BackendResult<()> {
        self.inner.remove(entity)
    }

    fn list_entities(&self, kind: EntityKind) -> BackendResult<Vec<String>> {
        self.inner.list_entities(kind)
    }
}

// ── Permissions ──────────────────────────────────────────────────

#[test]
fn site_permissions_come_before_common() {
    let (store, _) = store("admin");
    store.set_permissions(strings(&["site.manage"]), "").unwrap();
    store.set_permissions(strings(&["site.publish"]), "example.com").unwrap();

    assert_eq!(
        store.permissions("example.com"),
        strings(&["site.publish", "site.manage"])
    );
}

#[test]
fn common_site_returns_only_common() {
    let (store, _) = store("admin");
    store.set_permissions(strings(&["site.manage"]), "").unwrap();
    store.set_permissions(strings(&["site.publish"]), "example.com").unwrap();

    assert_eq!(store.permissions(""), strings(&["site.manage"]));
}

#[test]
fn duplicates_are_kept_at_store_layer() {
    let (store, _) = store("admin");
    store.set_permissions(strings(&["a", "b"]), "").unwrap();
    store.set_permissions(strings(&["a"]), "s").unwrap();

    assert_eq!(store.permissions("s"), strings(&["a", "a", "b"]));
}

#[test]
fn unknown_site_yields_common_only() {
    let (store, _) = store("admin");
    assert!(store.permissions("nowhere").is_empty());
    store.set_permissions(strings(&["x"]), "").unwrap();
    assert_eq!(store.permissions("nowhere"), strings(&["x"]));
}

#[test]
fn set_permissions_replaces_previous_list() {
    let (store, _) = store("admin");
    store.set_permissions(strings(&["a", "b"]), "s").unwrap();
    store.set_permissions(strings(&["c"]), "s").unwrap();
    assert_eq!(store.permissions("s"), strings(&["c"]));
}

// ── Prefix / suffix ──────────────────────────────────────────────

#[test]
fn prefix_defaults_to_empty() {
    let (store, _) = store("admin");
    assert_eq!(store.prefix("example.com"), "");
    assert_eq!(store.suffix(""), "");
}

#[test]
fn prefix_does_not_fall_back_to_common() {
    let (store, _) = store("admin");
    store.set_prefix("[Admin]", "").unwrap();
    assert_eq!(store.prefix(""), "[Admin]");
    assert_eq!(store.prefix("example.com"), "");
}

#[test]
fn suffix_is_site_scoped() {
    let (store, _) = store("admin");
    store.set_suffix("!", "example.com").unwrap();
    assert_eq!(store.suffix("example.com"), "!");
    assert_eq!(store.suffix("other.org"), "");
}

// ── Options ──────────────────────────────────────────────────────

#[test]
fn option_defaults_when_unset() {
    let (store, _) = store("admin");
    assert_eq!(store.option("theme", "", "default"), "default");
}

#[test]
fn set_option_merges_into_site_map() {
    let (store, _) = store("admin");
    store.set_option("theme", "dark", "s").unwrap();
    store.set_option("lang", "en", "s").unwrap();

    assert_eq!(store.option("theme", "s", "default"), "dark");
    assert_eq!(store.option("lang", "s", "default"), "en");
}

#[test]
fn option_does_not_fall_back_to_common() {
    let (store, _) = store("admin");
    store.set_option("theme", "dark", "").unwrap();
    assert_eq!(store.option("theme", "s", "light"), "light");
}

#[test]
fn remove_option_keeps_siblings() {
    let (store, _) = store("admin");
    store.set_option("theme", "dark", "s").unwrap();
    store.set_option("lang", "en", "s").unwrap();
    store.remove_option("theme", "s").unwrap();

    assert_eq!(store.option("theme", "s", "none"), "none");
    assert_eq!(store.option("lang", "s", "none"), "en");
}

// ── Sites ────────────────────────────────────────────────────────

#[test]
fn sites_is_union_of_options_and_permissions() {
    let (store, _) = store("admin");
    store.set_permissions(strings(&["a"]), "one.com").unwrap();
    store.set_option("k", "v", "two.com").unwrap();
    store.set_option("k", "v", "one.com").unwrap();
    store.set_prefix("p", "three.com").unwrap();

    let sites: Vec<String> = store.sites().into_iter().collect();
    assert_eq!(sites, strings(&["one.com", "two.com"]));
}

// ── Parents ──────────────────────────────────────────────────────

#[test]
fn parents_have_set_semantics() {
    let (store, _) = store("alice");
    store.set_parents(["mods", "users", "mods"], "example.com").unwrap();
    assert_eq!(store.parent_names("example.com"), strings(&["mods", "users"]));
    assert!(store.parent_names("").is_empty());
}

#[test]
fn empty_parent_list_clears_site() {
    let (store, _) = store("alice");
    store.set_parents(["mods"], "").unwrap();
    store.set_parents(Vec::<String>::new(), "").unwrap();
    assert!(store.parent_names("").is_empty());
    assert!(store.snapshot().parents.is_empty());
}

// ── Persistence ──────────────────────────────────────────────────

#[test]
fn writes_reach_the_backend() {
    let (store, backend) = store("admin");
    store.set_permissions(strings(&["site.manage"]), "").unwrap();

    let stored = backend.load(&EntityRef::group("admin")).unwrap().unwrap();
    assert_eq!(stored.common_permissions, strings(&["site.manage"]));
}

#[test]
fn load_starts_empty_for_unknown_entity() {
    let backend = Arc::new(MemoryBackend::new());
    let store = EntityStore::load(EntityRef::user("ghost"), backend).unwrap();
    assert!(store.snapshot().is_empty());
}

#[test]
fn failed_persist_leaves_record_untouched() {
    let backend = Arc::new(FlakyBackend::default());
    let store = EntityStore::new(EntityRef::group("g"), backend.clone(), EntityData::default());
    store.set_permissions(strings(&["a"]), "").unwrap();

    backend.failing.store(true, Ordering::SeqCst);
    let err = store.set_permissions(strings(&["b"]), "").unwrap_err();
    assert!(matches!(err, StoreError::Backend(BackendError::Storage(_))));
    assert_eq!(store.permissions(""), strings(&["a"]));
}

#[test]
fn save_is_repeatable() {
    let backend = Arc::new(FlakyBackend::default());
    let store = EntityStore::new(EntityRef::group("g"), backend.clone(), EntityData::default());
    store.save().unwrap();
    store.save().unwrap();
    assert_eq!(backend.writes.load(Ordering::SeqCst), 2);
}

#[test]
fn remove_clears_maps_and_backend() {
    let (store, backend) = store("admin");
    store.set_permissions(strings(&["a"]), "").unwrap();
    store.set_option("k", "v", "s").unwrap();
    store.remove().unwrap();

    assert!(store.is_removed());
    assert!(store.snapshot().is_empty());
    assert!(backend.load(&EntityRef::group("admin")).unwrap().is_none());
}

#[test]
fn writes_after_remove_are_rejected() {
    let (store, _) = store("admin");
    store.remove().unwrap();
    let err = store.set_prefix("x", "").unwrap_err();
    assert!(matches!(err, StoreError::Removed(ref e) if e == &EntityRef::group("admin")));
    assert!(format!("{err}").contains("removed"));
}

#[test]
fn retired_store_keeps_reads_and_rejects_writes() {
    let (store, backend) = store("admin");
    store.set_permissions(strings(&["a"]), "").unwrap();
    store.retire();

    assert!(store.is_retired());
    assert_eq!(store.permissions(""), strings(&["a"]));
    let err = store.set_permissions(strings(&["b"]), "").unwrap_err();
    assert!(matches!(err, StoreError::Retired(ref e) if e == &EntityRef::group("admin")));
    assert!(matches!(store.save(), Err(StoreError::Retired(_))));
    assert!(matches!(store.remove(), Err(StoreError::Retired(_))));

    let persisted = backend.load(&EntityRef::group("admin")).unwrap().unwrap();
    assert_eq!(persisted.own_permissions(""), strings(&["a"]));
}
