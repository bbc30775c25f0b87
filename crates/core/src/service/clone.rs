//! Clone and rename

use super::{child_groups, existing_groups, ZPermsCore};
use crate::dao::{PermissionDao, TransactionStrategy};
use crate::error::{PermissionError, Result};
use crate::events::{Invalidation, RefreshCause};
use crate::model::{same_name, EntityKind};

impl<S: TransactionStrategy> ZPermsCore<S> {
    /// Copy an entity to a new name, optionally removing the source
    ///
    /// Entries, metadata, priority and parents are copied. A cloned player
    /// also gets the source's memberships with their expirations. Renaming a
    /// group additionally moves its members and re-points child groups to
    /// the new name. Everything happens in one transaction.
    #[tracing::instrument(skip(self))]
    pub fn clone_entity(
        &self,
        source: &str,
        destination: &str,
        kind: EntityKind,
        rename: bool,
    ) -> Result<()> {
        self.storage.execute(|dao| {
            let entity = dao.entity(source, kind)?;
            let memberships = match kind {
                EntityKind::Player => dao.groups(source)?,
                EntityKind::Group => Vec::new(),
            };
            if entity.is_none() && memberships.is_empty() {
                return Err(PermissionError::SourceNotFound {
                    kind,
                    name: source.to_string(),
                });
            }
            if same_name(source, destination) || dao.entity(destination, kind)?.is_some() {
                return Err(PermissionError::DestinationExists {
                    kind,
                    name: destination.to_string(),
                });
            }

            if kind.is_group() {
                dao.create_group(destination)?;
            }

            if let Some(entity) = &entity {
                for entry in &entity.entries {
                    dao.set_permission(
                        destination,
                        kind,
                        entry.region.as_deref(),
                        entry.world.as_deref(),
                        &entry.permission,
                        entry.value,
                    )?;
                }
                for (key, value) in &entity.metadata {
                    dao.set_metadata(destination, kind, key, value.clone())?;
                }
                if kind.is_group() {
                    dao.set_priority(destination, entity.priority)?;
                    let parents = existing_groups(dao, &entity.parents)?;
                    dao.set_parents(destination, &parents)?;
                }
            }

            for membership in &memberships {
                dao.add_member(&membership.group, destination, membership.expiration)?;
            }

            if rename {
                if let (EntityKind::Group, Some(entity)) = (kind, &entity) {
                    for child in child_groups(dao, source)? {
                        let parents: Vec<String> = child
                            .parents
                            .iter()
                            .map(|p| {
                                if same_name(p, source) {
                                    destination.to_string()
                                } else {
                                    p.clone()
                                }
                            })
                            .collect();
                        let parents = existing_groups(dao, &parents)?;
                        dao.set_parents(&child.name, &parents)?;
                    }
                    for member in &entity.memberships {
                        dao.add_member(destination, &member.member, member.expiration)?;
                    }
                }
                dao.delete_entity(source, kind)?;
            }

            Ok(())
        })?;

        let verb = if rename { "renamed" } else { "cloned" };
        tracing::info!("{} {} {} to {}", kind, source, verb, destination);

        let mut events = Vec::new();
        match kind {
            EntityKind::Player => {
                events.push(Invalidation::player(destination, RefreshCause::Command));
                if rename {
                    events.push(Invalidation::player(source, RefreshCause::Command));
                }
                events.push(Invalidation::expirations(None));
            }
            EntityKind::Group => {
                events.push(Invalidation::group(destination));
                if rename {
                    events.push(Invalidation::group(source));
                    events.push(Invalidation::expirations(None));
                }
            }
        }
        self.fire(events);
        Ok(())
    }
}
