//! End-to-end behavior of the core over the in-memory store

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{core_with_tracks, grant, groups, live_groups};
use zperms_core::{
    Console, EntityKind, Invalidation, MemoryStore, PermissionError, PermissionMap, RankChange,
    RefreshCause, ZPermsConfig, ZPermsCore,
};

const NO_REGIONS: [&str; 0] = [];

#[test]
fn test_nearer_higher_priority_group_wins() {
    let core = core_with_tracks();
    groups(&core, &["default", "vip"]);
    core.set_priority("vip", 10).unwrap();
    core.set_parents("vip", ["default"]).unwrap();
    grant(&core, "default", "build", true);
    grant(&core, "vip", "build", false);
    grant(&core, "vip", "fly", true);
    core.add_member("vip", "alice", None).unwrap();

    let resolved = core
        .resolve("alice", EntityKind::Player, Some("world"), NO_REGIONS)
        .unwrap();

    let mut expected = PermissionMap::new();
    expected.insert("build".into(), false);
    expected.insert("fly".into(), true);
    assert_eq!(resolved.permissions, expected);
    assert_eq!(resolved.groups, vec!["default".to_string(), "vip".to_string()]);
}

#[test]
fn test_dump_expands_ancestors() {
    let core = core_with_tracks();
    core.set_permission("bob", EntityKind::Player, "a.b.c", None)
        .unwrap();

    let dumped = core
        .dump("bob", EntityKind::Player, Some("world"), NO_REGIONS, None)
        .unwrap();
    let nodes: Vec<(&str, bool)> = dumped
        .permissions
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    assert_eq!(nodes, vec![("a", true), ("a.b", true), ("a.b.c", true)]);

    let filtered = core
        .dump("bob", EntityKind::Player, Some("world"), NO_REGIONS, Some("B.C"))
        .unwrap();
    assert_eq!(filtered.permissions.len(), 1);

    // No default group exists, which is only a diagnostic
    assert!(dumped
        .diagnostics
        .iter()
        .any(|d| d.contains("not in any group")));
}

#[test]
fn test_missing_world_only_applies_global_entries() {
    let core = core_with_tracks();
    core.set_permission("carol", EntityKind::Player, "nether:fly", None)
        .unwrap();
    core.set_permission("carol", EntityKind::Player, "chat", None)
        .unwrap();

    let resolved = core
        .resolve("carol", EntityKind::Player, None, NO_REGIONS)
        .unwrap();
    assert_eq!(resolved.permissions.get("fly"), None);
    assert_eq!(resolved.permissions.get("chat"), Some(&true));
    assert!(resolved
        .diagnostics
        .iter()
        .any(|d| d.contains("No explicit world")));

    assert_eq!(
        core.check("carol", EntityKind::Player, Some("Nether"), NO_REGIONS, "FLY")
            .unwrap(),
        Some(true)
    );
}

#[test]
fn test_region_entries_override_world_entries() {
    let core = core_with_tracks();
    groups(&core, &["builders"]);
    grant(&core, "builders", "world:build", true);
    grant(&core, "builders", "spawn/world:build", false);
    core.add_member("builders", "dave", None).unwrap();

    let inside = core
        .check("dave", EntityKind::Player, Some("world"), ["Spawn"], "build")
        .unwrap();
    let outside = core
        .check("dave", EntityKind::Player, Some("world"), ["market"], "build")
        .unwrap();
    assert_eq!(inside, Some(false));
    assert_eq!(outside, Some(true));
}

#[test]
fn test_demote_twice_leaves_player_unranked() {
    let core = core_with_tracks();
    groups(&core, &["recruit", "member", "veteran"]);
    core.add_member("member", "erin", None).unwrap();

    assert_eq!(
        core.demote(&Console, "erin", None).unwrap(),
        RankChange::Changed {
            from: "member".into(),
            to: "recruit".into()
        }
    );
    assert_eq!(live_groups(&core, "erin"), vec!["recruit".to_string()]);

    assert_eq!(
        core.demote(&Console, "erin", None).unwrap(),
        RankChange::Removed {
            group: "recruit".into()
        }
    );
    assert!(live_groups(&core, "erin").is_empty());

    assert!(matches!(
        core.demote(&Console, "erin", None),
        Err(PermissionError::NotOnTrack { .. })
    ));
}

#[test]
fn test_default_group_is_the_implicit_first_rank() {
    common::init_logging();
    let config = ZPermsConfig::default().with_track("default", ["default", "member", "vip"]);
    let core = ZPermsCore::in_memory(config);
    groups(&core, &["default", "member", "vip"]);

    assert_eq!(
        core.promote(&Console, "newbie", None).unwrap(),
        RankChange::Changed {
            from: "default".into(),
            to: "member".into()
        }
    );
    assert_eq!(live_groups(&core, "newbie"), vec!["member".to_string()]);

    // A demote onto the default rank stores it like any other group
    core.demote(&Console, "newbie", None).unwrap();
    assert_eq!(live_groups(&core, "newbie"), vec!["default".to_string()]);

    // Demoting a fresh player drops them off the track without storing anything
    assert_eq!(
        core.demote(&Console, "visitor", None).unwrap(),
        RankChange::Removed {
            group: "default".into()
        }
    );
    assert!(live_groups(&core, "visitor").is_empty());
    let resolved = core
        .resolve("visitor", EntityKind::Player, Some("world"), NO_REGIONS)
        .unwrap();
    assert_eq!(resolved.groups, vec!["default".to_string()]);
}

#[test]
fn test_set_rank_replaces_current_rank() {
    let core = core_with_tracks();
    groups(&core, &["recruit", "member", "veteran", "builders"]);
    core.add_member("recruit", "frank", None).unwrap();
    core.add_member("builders", "frank", None).unwrap();

    core.set_rank(&Console, "frank", "Veteran", None).unwrap();
    assert_eq!(
        live_groups(&core, "frank"),
        vec!["builders".to_string(), "veteran".to_string()]
    );
}

#[test]
fn test_ambiguous_rank_is_refused() {
    let core = core_with_tracks();
    groups(&core, &["helper", "moderator", "admin"]);
    core.add_member("helper", "gina", None).unwrap();
    core.add_member("admin", "gina", None).unwrap();

    let err = core.promote(&Console, "gina", Some("staff")).unwrap_err();
    match err {
        PermissionError::AmbiguousRank { track, groups } => {
            assert_eq!(track, "staff");
            assert_eq!(groups, vec!["helper".to_string(), "admin".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        live_groups(&core, "gina"),
        vec!["admin".to_string(), "helper".to_string()]
    );
}

#[test]
fn test_rank_change_to_missing_group_is_atomic() {
    let core = core_with_tracks();
    // "admin" is on the track but was never created
    groups(&core, &["helper", "moderator"]);
    core.add_member("moderator", "hank", None).unwrap();

    let err = core.promote(&Console, "hank", Some("staff")).unwrap_err();
    assert!(matches!(err, PermissionError::MissingGroup(_)));
    assert_eq!(live_groups(&core, "hank"), vec!["moderator".to_string()]);
}

#[test]
fn test_clone_group_leaves_source_and_children_intact() {
    let core = core_with_tracks();
    groups(&core, &["base", "a", "child"]);
    grant(&core, "a", "x", true);
    core.set_priority("a", 5).unwrap();
    core.set_parents("a", ["base"]).unwrap();
    core.set_parents("child", ["a"]).unwrap();

    core.clone_entity("a", "b", EntityKind::Group, false)
        .unwrap();

    let b = core.entity("b", EntityKind::Group).unwrap().unwrap();
    assert_eq!(b.priority, 5);
    assert_eq!(b.parents, vec!["base".to_string()]);
    assert_eq!(
        core.get_permission("b", EntityKind::Group, "x").unwrap(),
        Some(true)
    );

    let a = core.entity("a", EntityKind::Group).unwrap().unwrap();
    assert_eq!(a.entries, b.entries);
    let child = core.entity("child", EntityKind::Group).unwrap().unwrap();
    assert_eq!(child.parents, vec!["a".to_string()]);
}

#[test]
fn test_clone_onto_existing_entity_changes_nothing() {
    let core = core_with_tracks();
    groups(&core, &["a", "b"]);
    grant(&core, "a", "x", true);
    grant(&core, "b", "y", false);

    let before = core.storage().to_json().unwrap();
    let err = core
        .clone_entity("a", "B", EntityKind::Group, false)
        .unwrap_err();
    assert!(matches!(err, PermissionError::DestinationExists { .. }));
    assert_eq!(core.storage().to_json().unwrap(), before);
}

#[test]
fn test_diff_between_groups() {
    let core = core_with_tracks();
    groups(&core, &["mods", "admins"]);
    grant(&core, "mods", "server.kick", true);
    grant(&core, "mods", "chat.color", true);
    grant(&core, "admins", "server.kick", true);
    grant(&core, "admins", "server.ban", true);
    grant(&core, "admins", "chat.color", false);

    let report = core
        .diff("mods", "admins", EntityKind::Group, Some("world"), NO_REGIONS, None)
        .unwrap();
    assert_eq!(report.diff.added.get("server.ban"), Some(&true));
    assert_eq!(report.diff.changed.get("chat.color"), Some(&(true, false)));
    assert_eq!(report.diff.changed.get("chat"), Some(&(true, false)));
    assert!(report.diff.removed.is_empty());

    let same = core
        .diff("mods", "mods", EntityKind::Group, Some("world"), NO_REGIONS, None)
        .unwrap();
    assert!(same.diff.is_empty());

    assert!(matches!(
        core.diff("mods", "nobody", EntityKind::Group, None, NO_REGIONS, None),
        Err(PermissionError::EntityNotFound { .. })
    ));
}

#[test]
fn test_protected_permissions_never_reach_storage() {
    let core = core_with_tracks();
    let version = core.storage().version();

    for attempt in ["zpermissions_player.fly", "spawn/world:ZPERMISSIONS_PLAYER.x"] {
        assert!(matches!(
            core.set_permission("ivy", EntityKind::Player, attempt, None),
            Err(PermissionError::ProtectedPermission(_))
        ));
    }
    assert_eq!(core.storage().version(), version);
}

#[test]
fn test_custom_protected_prefix() {
    let config = ZPermsConfig {
        dynamic_permission_prefix: "dyn.".into(),
        ..ZPermsConfig::default()
    };
    let core = ZPermsCore::new(MemoryStore::new(), config);

    assert!(core
        .set_permission("ivy", EntityKind::Player, "zpermissions_player.fly", None)
        .is_ok());
    assert!(core
        .set_permission("ivy", EntityKind::Player, "Dyn.fly", None)
        .is_err());
}

#[test]
fn test_expiring_membership() {
    let start = Utc::now();
    let clock = Arc::new(parking_lot::Mutex::new(start));
    let now = Arc::clone(&clock);
    let core = ZPermsCore::in_memory(ZPermsConfig::default()).with_clock(move || *now.lock());

    groups(&core, &["default", "vip"]);
    grant(&core, "vip", "fly", true);
    core.add_member("vip", "jane", Some(start + Duration::hours(1)))
        .unwrap();

    let fly = || {
        core.check("jane", EntityKind::Player, Some("world"), NO_REGIONS, "fly")
            .unwrap()
    };
    assert_eq!(fly(), Some(true));

    *clock.lock() = start + Duration::hours(2);
    assert_eq!(fly(), None);
    assert_eq!(core.sweep_expired().unwrap(), vec!["jane".to_string()]);
}

#[test]
fn test_listeners_receive_events_after_commit() {
    let core = core_with_tracks();
    groups(&core, &["recruit", "member", "veteran"]);

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let key = core.listeners().on_invalidate(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    let rx = core.listeners().subscribe();

    core.promote(&Console, "kim", None).unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        Invalidation::player("kim", RefreshCause::GroupChange)
    );
    assert_eq!(rx.try_recv().unwrap(), Invalidation::expirations(Some("kim")));

    // Failed operations are silent
    assert!(core.set_rank(&Console, "kim", "admin", None).is_err());
    assert!(rx.try_recv().is_err());

    assert_eq!(count.load(Ordering::Relaxed), 2);
    assert!(core.listeners().remove_listener(key));
}

#[test]
fn test_shared_store_between_cores() {
    let store = Arc::new(MemoryStore::new());
    let writer = ZPermsCore::new(Arc::clone(&store), ZPermsConfig::default());
    let reader = ZPermsCore::new(Arc::clone(&store), ZPermsConfig::default());

    writer.create_group("default").unwrap();
    grant_shared(&writer);

    assert_eq!(
        reader
            .check("lee", EntityKind::Player, Some("world"), NO_REGIONS, "chat")
            .unwrap(),
        Some(true)
    );
}

fn grant_shared(core: &ZPermsCore<Arc<MemoryStore>>) {
    core.set_permission("default", EntityKind::Group, "chat", None)
        .unwrap();
}
