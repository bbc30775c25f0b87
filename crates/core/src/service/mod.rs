//! Operation facade
//!
//! [`ZPermsCore`] is what a host talks to. Every public operation runs in one
//! transaction obtained from the configured [`TransactionStrategy`], and
//! mutations fire [`Invalidation`] events only after that transaction has
//! committed.
//!
//! # Example
//!
//! ```ignore
//! use zperms_core::{EntityKind, MemoryStore, ZPermsConfig, ZPermsCore};
//!
//! let core = ZPermsCore::new(MemoryStore::new(), ZPermsConfig::default());
//! core.create_group("vip")?;
//! core.set_permission("vip", EntityKind::Group, "nether:fly", None)?;
//! core.add_member("vip", "alice", None)?;
//!
//! let resolved = core.resolve("alice", EntityKind::Player, Some("nether"), ["spawn"])?;
//! assert_eq!(resolved.permissions.get("fly"), Some(&true));
//! ```

mod clone;
mod entity;
mod rank;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ZPermsConfig;
use crate::dao::{MemoryStore, PermissionDao, TransactionStrategy};
use crate::error::Result;
use crate::events::{Invalidation, InvalidationListeners};
use crate::model::{EntityKind, PermissionEntity};
use crate::permissions::{diff, filter_permissions, PermissionDiff};
use crate::resolver::{normalize_regions, PermissionsResolver, ResolvedPermissions};

/// Source of the current time, used to filter expired memberships
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of comparing two entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Changes going from the first entity to the other one
    pub diff: PermissionDiff,
    /// Advisory notes from both resolutions
    pub diagnostics: Vec<String>,
}

/// Permission resolution and administration over a transactional store
pub struct ZPermsCore<S: TransactionStrategy> {
    storage: S,
    config: ZPermsConfig,
    resolver: PermissionsResolver,
    listeners: InvalidationListeners,
    clock: Clock,
}

impl<S: TransactionStrategy> fmt::Debug for ZPermsCore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZPermsCore")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<S: TransactionStrategy> ZPermsCore<S> {
    pub fn new(storage: S, config: ZPermsConfig) -> Self {
        let resolver = PermissionsResolver::new(&config.default_group);
        tracing::info!(
            "zperms core ready (default group {}, {} tracks)",
            config.default_group,
            config.tracks.len()
        );
        Self {
            storage,
            config,
            resolver,
            listeners: InvalidationListeners::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for membership expiration
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &ZPermsConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PermissionsResolver {
        &self.resolver
    }

    /// Registry the host subscribes to for cache invalidation
    pub fn listeners(&self) -> &InvalidationListeners {
        &self.listeners
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Resolve the raw effective permissions of a player or group
    ///
    /// Groups must exist; players without any data resolve through the
    /// default group.
    #[tracing::instrument(skip(self, regions))]
    pub fn resolve<I, R>(
        &self,
        name: &str,
        kind: EntityKind,
        world: Option<&str>,
        regions: I,
    ) -> Result<ResolvedPermissions>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let regions = normalize_regions(regions);
        let now = self.now();
        self.storage
            .execute_read_only(|dao| self.resolver.resolve(dao, name, kind, world, &regions, now))
    }

    /// Value of one node in the raw (unexpanded) effective map
    pub fn check<I, R>(
        &self,
        name: &str,
        kind: EntityKind,
        world: Option<&str>,
        regions: I,
        permission: &str,
    ) -> Result<Option<bool>>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let resolved = self.resolve(name, kind, world, regions)?;
        Ok(resolved.permissions.get(&permission.to_lowercase()).copied())
    }

    /// Expanded effective permissions, optionally filtered by substring
    #[tracing::instrument(skip(self, regions))]
    pub fn dump<I, R>(
        &self,
        name: &str,
        kind: EntityKind,
        world: Option<&str>,
        regions: I,
        filter: Option<&str>,
    ) -> Result<ResolvedPermissions>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let mut resolved = self.resolve(name, kind, world, regions)?;
        let expanded = resolved.expanded();
        resolved.permissions = match filter {
            Some(filter) => filter_permissions(&expanded, filter),
            None => expanded,
        };
        Ok(resolved)
    }

    /// Compare the expanded permissions of `name` against `other`
    ///
    /// Nodes only `other` has are reported as added.
    #[tracing::instrument(skip(self, regions))]
    pub fn diff<I, R>(
        &self,
        name: &str,
        other: &str,
        kind: EntityKind,
        world: Option<&str>,
        regions: I,
        filter: Option<&str>,
    ) -> Result<DiffReport>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let regions = normalize_regions(regions);
        let now = self.now();

        let (mine, theirs) = self.storage.execute_read_only(|dao| {
            let mine = self.resolver.resolve(dao, name, kind, world, &regions, now)?;
            let theirs = self.resolver.resolve(dao, other, kind, world, &regions, now)?;
            Ok((mine, theirs))
        })?;

        let mut changes = diff(&mine.expanded(), &theirs.expanded());
        if let Some(filter) = filter {
            changes = changes.filtered(filter);
        }

        let mut diagnostics = mine.diagnostics;
        for note in theirs.diagnostics {
            if !diagnostics.contains(&note) {
                diagnostics.push(note);
            }
        }

        Ok(DiffReport {
            diff: changes,
            diagnostics,
        })
    }

    /// Load an entity as stored
    pub fn entity(&self, name: &str, kind: EntityKind) -> Result<Option<PermissionEntity>> {
        self.storage.execute_read_only(|dao| dao.entity(name, kind))
    }

    /// Names of all stored entities of a kind, sorted
    pub fn entity_names(&self, kind: EntityKind) -> Result<Vec<String>> {
        let mut names = self.storage.execute_read_only(|dao| dao.entity_names(kind))?;
        names.sort_by_key(|n| n.to_lowercase());
        Ok(names)
    }

    fn fire(&self, events: Vec<Invalidation>) {
        self.listeners.fire_all(events);
    }
}

impl ZPermsCore<MemoryStore> {
    /// Core over a fresh in-memory store using the configured retry budget
    pub fn in_memory(config: ZPermsConfig) -> Self {
        let store = MemoryStore::new().with_max_retries(config.max_retries);
        Self::new(store, config)
    }
}

/// Groups listing `parent` among their parents
fn child_groups<D>(dao: &D, parent: &str) -> Result<Vec<PermissionEntity>>
where
    D: PermissionDao + ?Sized,
{
    let mut children = Vec::new();
    for name in dao.entity_names(EntityKind::Group)? {
        if let Some(group) = dao.entity(&name, EntityKind::Group)? {
            if group.has_parent(parent) {
                children.push(group);
            }
        }
    }
    Ok(children)
}

/// Drop names of groups that no longer exist
fn existing_groups<D>(dao: &D, names: &[String]) -> Result<Vec<String>>
where
    D: PermissionDao + ?Sized,
{
    let mut existing = Vec::with_capacity(names.len());
    for name in names {
        if dao.entity(name, EntityKind::Group)?.is_some() {
            existing.push(name.clone());
        }
    }
    Ok(existing)
}
