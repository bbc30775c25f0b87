//! Entity, membership and metadata operations

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::ZPermsCore;
use crate::dao::{PermissionDao, TransactionStrategy};
use crate::error::{PermissionError, Result};
use crate::events::{Invalidation, RefreshCause};
use crate::model::{
    filter_expired, same_name, EntityKind, Membership, MetadataValue, PREFIX_KEY, SUFFIX_KEY,
};
use crate::permissions::{check_dynamic_permission, QualifiedPermission};

/// Event for a direct change to one entity's own data
fn entity_changed(name: &str, kind: EntityKind) -> Invalidation {
    match kind {
        EntityKind::Player => Invalidation::player(name, RefreshCause::Command),
        EntityKind::Group => Invalidation::group(name),
    }
}

fn membership_changed(player: &str) -> Vec<Invalidation> {
    vec![
        Invalidation::player(player, RefreshCause::GroupChange),
        Invalidation::expirations(Some(player)),
    ]
}

/// Whether linking `group` under `parent` closes a loop
fn creates_cycle<D>(dao: &D, group: &str, parent: &str) -> Result<bool>
where
    D: PermissionDao + ?Sized,
{
    let group = group.to_lowercase();
    let mut pending = vec![parent.to_lowercase()];
    let mut seen = HashSet::new();

    while let Some(current) = pending.pop() {
        if current == group {
            return Ok(true);
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(entity) = dao.entity(&current, EntityKind::Group)? {
            pending.extend(entity.parents.iter().map(|p| p.to_lowercase()));
        }
    }
    Ok(false)
}

fn require_group<D>(dao: &D, group: &str) -> Result<Vec<String>>
where
    D: PermissionDao + ?Sized,
{
    dao.entity(group, EntityKind::Group)?
        .map(|g| g.parents)
        .ok_or_else(|| PermissionError::EntityNotFound {
            kind: EntityKind::Group,
            name: group.to_string(),
        })
}

impl<S: TransactionStrategy> ZPermsCore<S> {
    /// Parse a qualified permission and refuse the reserved namespace
    fn guarded(&self, permission: &str) -> Result<QualifiedPermission> {
        let qualified = QualifiedPermission::parse(permission)?;
        check_dynamic_permission(qualified.permission(), &self.config.dynamic_permission_prefix)?;
        Ok(qualified)
    }

    /// Stored value of one qualified entry
    #[tracing::instrument(skip(self))]
    pub fn get_permission(
        &self,
        name: &str,
        kind: EntityKind,
        permission: &str,
    ) -> Result<Option<bool>> {
        let qualified = self.guarded(permission)?;
        self.storage.execute_read_only(|dao| {
            dao.permission(
                name,
                kind,
                qualified.region(),
                qualified.world(),
                qualified.permission(),
            )
        })
    }

    /// Set a qualified entry; an absent value means `true`
    #[tracing::instrument(skip(self))]
    pub fn set_permission(
        &self,
        name: &str,
        kind: EntityKind,
        permission: &str,
        value: Option<bool>,
    ) -> Result<()> {
        let qualified = self.guarded(permission)?;
        let value = value.unwrap_or(true);

        self.storage.execute(|dao| {
            dao.set_permission(
                name,
                kind,
                qualified.region(),
                qualified.world(),
                qualified.permission(),
                value,
            )
        })?;

        tracing::info!("{} {}: set {} to {}", kind, name, qualified, value);
        self.fire(vec![entity_changed(name, kind)]);
        Ok(())
    }

    /// Remove a qualified entry, returning whether it existed
    #[tracing::instrument(skip(self))]
    pub fn unset_permission(&self, name: &str, kind: EntityKind, permission: &str) -> Result<bool> {
        let qualified = self.guarded(permission)?;

        let removed = self.storage.execute(|dao| {
            dao.unset_permission(
                name,
                kind,
                qualified.region(),
                qualified.world(),
                qualified.permission(),
            )
        })?;

        if removed {
            tracing::info!("{} {}: unset {}", kind, name, qualified);
            self.fire(vec![entity_changed(name, kind)]);
        }
        Ok(removed)
    }

    /// Delete an entity along with its memberships
    #[tracing::instrument(skip(self))]
    pub fn delete_entity(&self, name: &str, kind: EntityKind) -> Result<bool> {
        let deleted = self.storage.execute(|dao| dao.delete_entity(name, kind))?;

        if deleted {
            tracing::info!("{} {} deleted", kind, name);
            self.fire(vec![entity_changed(name, kind), Invalidation::expirations(None)]);
        } else {
            tracing::debug!("{} {} not found, nothing deleted", kind, name);
        }
        Ok(deleted)
    }

    /// Create an empty group, returning `false` if it already exists
    #[tracing::instrument(skip(self))]
    pub fn create_group(&self, name: &str) -> Result<bool> {
        let created = self.storage.execute(|dao| dao.create_group(name))?;
        if created {
            tracing::info!("Group {} created", name);
        }
        Ok(created)
    }

    /// Replace the parents of a group
    ///
    /// Fails with [`PermissionError::CyclicHierarchy`] without storing
    /// anything if a parent is the group itself or one of its descendants.
    #[tracing::instrument(skip(self, parents))]
    pub fn set_parents<I, P>(&self, group: &str, parents: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let parents: Vec<String> = parents
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        self.storage.execute(|dao| {
            require_group(dao, group)?;
            for parent in &parents {
                if creates_cycle(dao, group, parent)? {
                    return Err(PermissionError::CyclicHierarchy {
                        group: group.to_string(),
                        parent: parent.clone(),
                    });
                }
            }
            dao.set_parents(group, &parents)
        })?;

        tracing::info!("Group {}: parents set to [{}]", group, parents.join(", "));
        self.fire(vec![Invalidation::group(group)]);
        Ok(())
    }

    /// Append a parent unless already present
    #[tracing::instrument(skip(self))]
    pub fn add_parent(&self, group: &str, parent: &str) -> Result<()> {
        self.storage.execute(|dao| {
            let stored = require_group(dao, group)?;
            if stored.iter().any(|p| same_name(p, parent)) {
                return Ok(());
            }
            let mut parents = super::existing_groups(dao, &stored)?;
            if creates_cycle(dao, group, parent)? {
                return Err(PermissionError::CyclicHierarchy {
                    group: group.to_string(),
                    parent: parent.to_string(),
                });
            }
            parents.push(parent.to_string());
            dao.set_parents(group, &parents)
        })?;

        tracing::info!("Group {}: added parent {}", group, parent);
        self.fire(vec![Invalidation::group(group)]);
        Ok(())
    }

    /// Drop one parent, returning whether it was linked
    #[tracing::instrument(skip(self))]
    pub fn remove_parent(&self, group: &str, parent: &str) -> Result<bool> {
        let removed = self.storage.execute(|dao| {
            let mut parents = require_group(dao, group)?;
            let before = parents.len();
            parents.retain(|p| !same_name(p, parent));
            if parents.len() == before {
                return Ok(false);
            }
            let parents = super::existing_groups(dao, &parents)?;
            dao.set_parents(group, &parents)?;
            Ok(true)
        })?;

        if removed {
            tracing::info!("Group {}: removed parent {}", group, parent);
            self.fire(vec![Invalidation::group(group)]);
        }
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_priority(&self, group: &str, priority: i32) -> Result<()> {
        self.storage.execute(|dao| dao.set_priority(group, priority))?;

        tracing::info!("Group {}: priority set to {}", group, priority);
        self.fire(vec![Invalidation::group(group)]);
        Ok(())
    }

    /// Add a player to a group, optionally until `expiration`
    ///
    /// Re-adding an existing member replaces its expiration.
    #[tracing::instrument(skip(self))]
    pub fn add_member(
        &self,
        group: &str,
        player: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.storage
            .execute(|dao| dao.add_member(group, player, expiration))?;

        match expiration {
            Some(at) => tracing::info!("Player {} added to {} until {}", player, group, at),
            None => tracing::info!("Player {} added to {}", player, group),
        }
        self.fire(membership_changed(player));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_member(&self, group: &str, player: &str) -> Result<bool> {
        let removed = self
            .storage
            .execute(|dao| dao.remove_member(group, player))?;

        if removed {
            tracing::info!("Player {} removed from {}", player, group);
            self.fire(membership_changed(player));
        }
        Ok(removed)
    }

    /// Live members of a group
    pub fn members(&self, group: &str) -> Result<Vec<Membership>> {
        let now = self.now();
        self.storage.execute_read_only(|dao| {
            let group = dao
                .entity(group, EntityKind::Group)?
                .ok_or_else(|| PermissionError::EntityNotFound {
                    kind: EntityKind::Group,
                    name: group.to_string(),
                })?;
            Ok(filter_expired(group.memberships, now))
        })
    }

    /// Live groups of a player
    pub fn player_groups(&self, player: &str) -> Result<Vec<Membership>> {
        let now = self.now();
        self.storage
            .execute_read_only(|dao| Ok(filter_expired(dao.groups(player)?, now)))
    }

    /// Remove every membership that has expired
    ///
    /// Returns the affected players, each once.
    #[tracing::instrument(skip(self))]
    pub fn sweep_expired(&self) -> Result<Vec<String>> {
        let now = self.now();

        let players = self.storage.execute(|dao| {
            let mut players: Vec<String> = Vec::new();
            for group in dao.entity_names(EntityKind::Group)? {
                let Some(entity) = dao.entity(&group, EntityKind::Group)? else {
                    continue;
                };
                for membership in entity.memberships.iter().filter(|m| m.is_expired(now)) {
                    if dao.remove_member(&membership.group, &membership.member)?
                        && !players.iter().any(|p| same_name(p, &membership.member))
                    {
                        players.push(membership.member.clone());
                    }
                }
            }
            Ok(players)
        })?;

        if !players.is_empty() {
            tracing::info!("Swept expired memberships of {} players", players.len());
            let mut events: Vec<Invalidation> = players
                .iter()
                .map(|p| Invalidation::player(p, RefreshCause::ExpirationSwept))
                .collect();
            events.push(Invalidation::expirations(None));
            self.fire(events);
        }
        Ok(players)
    }

    pub fn get_metadata(
        &self,
        name: &str,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<MetadataValue>> {
        self.storage.execute_read_only(|dao| dao.metadata(name, kind, key))
    }

    #[tracing::instrument(skip(self, value))]
    pub fn set_metadata<V>(&self, name: &str, kind: EntityKind, key: &str, value: V) -> Result<()>
    where
        V: Into<MetadataValue>,
    {
        let value = value.into();
        self.storage
            .execute(|dao| dao.set_metadata(name, kind, key, value.clone()))?;

        tracing::info!("{} {}: metadata {} set to {}", kind, name, key, value);
        self.fire(vec![entity_changed(name, kind)]);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn unset_metadata(&self, name: &str, kind: EntityKind, key: &str) -> Result<bool> {
        let removed = self
            .storage
            .execute(|dao| dao.unset_metadata(name, kind, key))?;

        if removed {
            tracing::info!("{} {}: metadata {} unset", kind, name, key);
            self.fire(vec![entity_changed(name, kind)]);
        }
        Ok(removed)
    }

    /// Set the chat prefix; an empty value removes it
    pub fn set_prefix(&self, name: &str, kind: EntityKind, prefix: &str) -> Result<()> {
        self.set_or_clear(name, kind, PREFIX_KEY, prefix)
    }

    /// Set the chat suffix; an empty value removes it
    pub fn set_suffix(&self, name: &str, kind: EntityKind, suffix: &str) -> Result<()> {
        self.set_or_clear(name, kind, SUFFIX_KEY, suffix)
    }

    fn set_or_clear(&self, name: &str, kind: EntityKind, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            self.unset_metadata(name, kind, key).map(|_| ())
        } else {
            self.set_metadata(name, kind, key, value)
        }
    }
}
