//! Effective permission resolution
//!
//! Given a player or group, a world and a set of regions, the resolver walks
//! the group hierarchy and merges entries into one `node -> value` map.
//!
//! # Merge order
//!
//! ```text
//! farthest ancestors ──► nearer ancestors ──► direct groups ──► own entries
//!        (within one distance: lower priority first, then declaration order)
//! ```
//!
//! Every later merge overwrites earlier values, so the entity's own entries
//! always win. Within a single group, entries are applied from least to most
//! specific: global, world, region, region+world.

mod closure;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::dao::PermissionDao;
use crate::error::{PermissionError, Result};
use crate::model::{filter_expired, Entry, EntityKind};
use crate::permissions::{expand, PermissionMap};

pub use closure::{ancestor_closure, ClosureGroup};

/// Outcome of a resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPermissions {
    /// Raw merged map, not expanded
    pub permissions: PermissionMap,
    /// Display names of the merged groups, in merge order
    pub groups: Vec<String>,
    /// Advisory notes; never part of the result map
    pub diagnostics: Vec<String>,
}

impl ResolvedPermissions {
    /// Raw map with child permissions derived
    pub fn expanded(&self) -> PermissionMap {
        expand(&self.permissions)
    }
}

/// Lower-case a set of region names
pub fn normalize_regions<I, S>(regions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    regions
        .into_iter()
        .map(|r| r.as_ref().trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Resolves effective permissions against a DAO snapshot
#[derive(Debug, Clone)]
pub struct PermissionsResolver {
    default_group: String,
}

impl PermissionsResolver {
    pub fn new(default_group: &str) -> Self {
        Self {
            default_group: default_group.to_lowercase(),
        }
    }

    /// Group standing in for players without live memberships
    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    /// Dispatch on entity kind
    pub fn resolve<D>(
        &self,
        dao: &D,
        name: &str,
        kind: EntityKind,
        world: Option<&str>,
        regions: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<ResolvedPermissions>
    where
        D: PermissionDao + ?Sized,
    {
        match kind {
            EntityKind::Player => self.resolve_player(dao, name, world, regions, now),
            EntityKind::Group => self.resolve_group(dao, name, world, regions),
        }
    }

    /// Resolve a player
    ///
    /// A player without live memberships resolves as a member of the default
    /// group. That membership is never stored.
    pub fn resolve_player<D>(
        &self,
        dao: &D,
        name: &str,
        world: Option<&str>,
        regions: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<ResolvedPermissions>
    where
        D: PermissionDao + ?Sized,
    {
        let mut diagnostics = Vec::new();
        note_world(world, &mut diagnostics);

        let mut roots: Vec<String> = filter_expired(dao.groups(name)?, now)
            .into_iter()
            .map(|m| m.group)
            .collect();
        if roots.is_empty() {
            diagnostics.push(format!(
                "Player {} is not in any group; using default group {}",
                name, self.default_group
            ));
            roots.push(self.default_group.clone());
        }

        let own_entries = dao
            .entity(name, EntityKind::Player)?
            .map(|e| e.entries)
            .unwrap_or_default();

        let closure = ancestor_closure(dao, None, &roots, &mut diagnostics)?;
        Ok(merge(&closure, &own_entries, world, regions, diagnostics))
    }

    /// Resolve a group, failing if it does not exist
    pub fn resolve_group<D>(
        &self,
        dao: &D,
        name: &str,
        world: Option<&str>,
        regions: &BTreeSet<String>,
    ) -> Result<ResolvedPermissions>
    where
        D: PermissionDao + ?Sized,
    {
        let entity = dao
            .entity(name, EntityKind::Group)?
            .ok_or_else(|| PermissionError::EntityNotFound {
                kind: EntityKind::Group,
                name: name.to_string(),
            })?;

        let mut diagnostics = Vec::new();
        note_world(world, &mut diagnostics);

        let closure = ancestor_closure(dao, Some(&entity.name), &entity.parents, &mut diagnostics)?;
        let mut resolved = merge(&closure, &entity.entries, world, regions, diagnostics);
        resolved.groups.push(entity.display_name);
        Ok(resolved)
    }
}

fn note_world(world: Option<&str>, diagnostics: &mut Vec<String>) {
    if world.is_none() {
        diagnostics.push(
            "No explicit world given; only world-independent entries apply".to_string(),
        );
    }
}

fn merge(
    closure: &[ClosureGroup],
    own_entries: &[Entry],
    world: Option<&str>,
    regions: &BTreeSet<String>,
    diagnostics: Vec<String>,
) -> ResolvedPermissions {
    let mut permissions = PermissionMap::new();
    let mut groups = Vec::with_capacity(closure.len());

    for group in closure {
        tracing::trace!(
            "Merging {} (distance {}, priority {})",
            group.name(),
            group.distance,
            group.priority()
        );
        apply_entries(&mut permissions, &group.entity.entries, world, regions);
        groups.push(group.entity.display_name.clone());
    }
    apply_entries(&mut permissions, own_entries, world, regions);

    ResolvedPermissions {
        permissions,
        groups,
        diagnostics,
    }
}

/// Merge one entity's applicable entries, least specific first
///
/// Region entries are applied in ascending region name order, so when two
/// requested regions disagree the greater name wins.
pub fn apply_entries(
    target: &mut PermissionMap,
    entries: &[Entry],
    world: Option<&str>,
    regions: &BTreeSet<String>,
) {
    let world = world.map(str::to_lowercase);
    let world = world.as_deref();

    let mut apply = |region: Option<&str>, world: Option<&str>| {
        for entry in entries {
            if entry.region.as_deref() == region && entry.world.as_deref() == world {
                target.insert(entry.permission.clone(), entry.value);
            }
        }
    };

    apply(None, None);
    if world.is_some() {
        apply(None, world);
    }
    for region in regions {
        apply(Some(region.as_str()), None);
    }
    if world.is_some() {
        for region in regions {
            apply(Some(region.as_str()), world);
        }
    }
}
