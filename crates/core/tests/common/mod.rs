//! Shared fixtures for the integration suites

#![allow(dead_code)]

use zperms_core::{EntityKind, MemoryStore, ZPermsConfig, ZPermsCore};

/// Route `tracing` output to the test harness; later calls are no-ops
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn core_with_tracks() -> ZPermsCore<MemoryStore> {
    init_logging();
    let config = ZPermsConfig::default()
        .with_track("default", ["recruit", "member", "veteran"])
        .with_track("staff", ["helper", "moderator", "admin"]);
    ZPermsCore::in_memory(config)
}

pub fn groups(core: &ZPermsCore<MemoryStore>, names: &[&str]) {
    for name in names {
        core.create_group(name).unwrap();
    }
}

pub fn grant(core: &ZPermsCore<MemoryStore>, group: &str, permission: &str, value: bool) {
    core.set_permission(group, EntityKind::Group, permission, Some(value))
        .unwrap();
}

pub fn live_groups(core: &ZPermsCore<MemoryStore>, player: &str) -> Vec<String> {
    let mut groups: Vec<String> = core
        .player_groups(player)
        .unwrap()
        .into_iter()
        .map(|m| m.group.to_lowercase())
        .collect();
    groups.sort();
    groups
}
