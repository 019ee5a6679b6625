use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sitegate_core::{PermissionManager, PermissionsError};
use sitegate_store::StoreError;
use sitegate_types::{EntityEvent, EntityEventAction, EntityRef};
use std::sync::Arc;
use std::time::Duration;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn record_actions(manager: &PermissionManager) -> Arc<Mutex<Vec<EntityEventAction>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .events()
        .on_any_entity(move |event: &EntityEvent| sink.lock().push(event.action));
    seen
}

// ── Accessors ────────────────────────────────────────────────────

#[test]
fn option_defaults_when_unset() {
    let manager = PermissionManager::in_memory();
    let admin = manager.group("admin").unwrap();

    assert_eq!(admin.option("theme", "", "default"), "default");
}

#[test]
fn option_does_not_fall_back_to_common() {
    let manager = PermissionManager::in_memory();
    let admin = manager.group("admin").unwrap();
    admin.set_option("theme", "dark", "").unwrap();

    assert_eq!(admin.option("theme", "example.com", "light"), "light");
    assert_eq!(admin.option("theme", "", "light"), "dark");
}

#[test]
fn set_option_merges_into_site() {
    let manager = PermissionManager::in_memory();
    let admin = manager.group("admin").unwrap();
    admin.set_option("theme", "dark", "example.com").unwrap();
    admin.set_option("lang", "en", "example.com").unwrap();

    assert_eq!(admin.option("theme", "example.com", ""), "dark");
    assert_eq!(admin.option("lang", "example.com", ""), "en");

    admin.remove_option("theme", "example.com").unwrap();
    assert_eq!(admin.option("theme", "example.com", "none"), "none");
    assert_eq!(admin.option("lang", "example.com", ""), "en");
}

#[test]
fn sites_unions_permissions_and_options() {
    let manager = PermissionManager::in_memory();
    let admin = manager.group("admin").unwrap();
    admin.set_permissions(strings(&["a"]), "one.com").unwrap();
    admin.set_option("k", "v", "two.com").unwrap();

    let sites: Vec<String> = admin.sites().into_iter().collect();
    assert_eq!(sites, strings(&["one.com", "two.com"]));
}

#[test]
fn add_permission_goes_first_and_moves_existing() {
    let manager = PermissionManager::in_memory();
    let admin = manager.group("admin").unwrap();
    admin.set_permissions(strings(&["a", "b"]), "").unwrap();
    admin.add_permission("c", "").unwrap();
    admin.add_permission("b", "").unwrap();

    assert_eq!(admin.own_permissions(""), strings(&["b", "c", "a"]));
}

#[test]
fn parent_group_names_merge_site_and_common() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    alice.set_parents(["members", "mods"], "").unwrap();
    alice.set_parents(["mods", "editors"], "example.com").unwrap();

    assert_eq!(
        alice.parent_group_names("example.com"),
        strings(&["editors", "mods", "members"])
    );
    assert_eq!(alice.parent_names("example.com"), strings(&["editors", "mods"]));
}

// ── Events ───────────────────────────────────────────────────────

#[test]
fn each_mutation_emits_exactly_one_event() {
    let manager = PermissionManager::in_memory();
    let seen = record_actions(&manager);
    let group = manager.group("staff").unwrap();

    group.set_permissions(strings(&["a"]), "").unwrap();
    group.set_option("k", "v", "").unwrap();
    group.set_parents(["base"], "").unwrap();
    group.set_prefix("[S]", "").unwrap();
    group.set_weight(3).unwrap();
    group.set_rank(2).unwrap();
    group.set_default("", true).unwrap();
    group.save().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            EntityEventAction::PermissionsChanged,
            EntityEventAction::OptionsChanged,
            EntityEventAction::InheritanceChanged,
            EntityEventAction::InfoChanged,
            EntityEventAction::WeightChanged,
            EntityEventAction::RankChanged,
            EntityEventAction::DefaultGroupChanged,
            EntityEventAction::Saved,
        ]
    );
}

#[test]
fn listener_sees_post_mutation_state() {
    let manager = PermissionManager::in_memory();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let observer = manager.clone();
    manager
        .events()
        .on_entity(EntityEventAction::InheritanceChanged, move |event| {
            let entity = observer.entity(&event.entity).unwrap();
            sink.lock().push(entity.parent_names("example.com"));
        });

    manager
        .set_parents(&EntityRef::user("alice"), strings(&["mods"]), "example.com")
        .unwrap();

    assert_eq!(*observed.lock(), vec![strings(&["mods"])]);
}

#[test]
fn event_names_the_mutated_entity() {
    let manager = PermissionManager::in_memory();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .events()
        .on_entity(EntityEventAction::InfoChanged, move |event| sink.lock().push(event.entity.clone()));

    manager.set_suffix(&EntityRef::user("alice"), "!", "").unwrap();

    assert_eq!(*seen.lock(), vec![EntityRef::user("alice")]);
}

#[test]
fn unsubscribed_listener_is_not_called() {
    let manager = PermissionManager::in_memory();
    let seen = Arc::new(Mutex::new(0));
    let sink = seen.clone();
    let id = manager.events().on_any_entity(move |_| *sink.lock() += 1);

    manager.group("g").unwrap().set_weight(1).unwrap();
    assert!(manager.events().unsubscribe(id));
    manager.group("g").unwrap().set_weight(2).unwrap();

    assert_eq!(*seen.lock(), 1);
    assert!(!manager.events().unsubscribe(id));
}

// ── Timed permissions ────────────────────────────────────────────

#[test]
fn timed_permission_is_granted_until_expiry() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    let expires = Utc::now() + TimeDelta::hours(1);
    alice.add_timed_permission_until("event.host", "", expires).unwrap();

    let user = EntityRef::user("alice");
    assert!(manager.has_permission(&user, "event.host", "").unwrap());
    assert!(alice.own_permissions("").is_empty());

    let seen = record_actions(&manager);
    assert_eq!(manager.expire_timed_permissions(expires + TimeDelta::seconds(1)), 1);
    assert_eq!(*seen.lock(), vec![EntityEventAction::TimedPermissionExpired]);
    assert!(!manager.has_permission(&user, "event.host", "").unwrap());
}

#[test]
fn already_expired_timed_permission_is_ignored() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    alice.add_timed_permission_until("event.host", "", Utc::now() - TimeDelta::seconds(1)).unwrap();

    assert!(!manager.has_permission(&EntityRef::user("alice"), "event.host", "").unwrap());
}

#[test]
fn timed_permission_precedes_stored_negation() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    alice.set_permissions(strings(&["-chat.speak"]), "").unwrap();
    alice.add_timed_permission("chat.speak", "", Duration::from_secs(600)).unwrap();

    assert!(manager.has_permission(&EntityRef::user("alice"), "chat.speak", "").unwrap());
}

#[test]
fn removing_timed_permission_revokes_it() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    alice.add_timed_permission("chat.speak", "example.com", Duration::from_secs(600)).unwrap();

    let user = EntityRef::user("alice");
    assert!(manager.has_permission(&user, "chat.speak", "example.com").unwrap());
    assert!(alice.remove_timed_permission("chat.speak", "example.com"));
    assert!(!manager.has_permission(&user, "chat.speak", "example.com").unwrap());
    assert!(!alice.remove_timed_permission("chat.speak", "example.com"));
}

#[test]
fn expire_sweep_without_expiry_is_silent() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    alice.add_timed_permission("chat.speak", "", Duration::from_secs(600)).unwrap();

    let seen = record_actions(&manager);
    assert_eq!(manager.expire_timed_permissions(Utc::now()), 0);
    assert!(seen.lock().is_empty());
}

// ── Removal ──────────────────────────────────────────────────────

#[test]
fn removed_handle_rejects_writes() {
    let manager = PermissionManager::in_memory();
    let alice = manager.user("alice").unwrap();
    alice.set_permissions(strings(&["a"]), "").unwrap();
    alice.remove().unwrap();

    assert!(alice.is_removed());
    assert!(alice.permissions("").is_empty());
    let err = alice.set_permissions(strings(&["b"]), "").unwrap_err();
    assert!(matches!(err, PermissionsError::Store(StoreError::Removed(ref e)) if e == &EntityRef::user("alice")));
}

#[test]
fn remove_emits_removed_and_evicts() {
    let manager = PermissionManager::in_memory();
    let seen = record_actions(&manager);
    let before = manager.group("staff").unwrap();
    before.set_weight(1).unwrap();

    manager.remove_group("staff").unwrap();
    assert!(!manager.group_names().unwrap().contains(&"staff".to_string()));
    let after = manager.group("staff").unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.weight(), 0);
    assert_eq!(
        *seen.lock(),
        vec![EntityEventAction::WeightChanged, EntityEventAction::Removed]
    );
}
