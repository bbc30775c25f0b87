//! In-memory system of record
//!
//! [`MemoryStore`] keeps a single versioned [`MemoryDao`] behind a lock. Each
//! read-write unit of work runs against a private copy, which is committed
//! only if the unit succeeds and nobody else committed in the meantime.
//! Otherwise the copy is thrown away, so a failed unit never leaves a partial
//! effect behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{PermissionDao, TransactionStrategy};
use crate::error::{PermissionError, Result};
use crate::model::{same_name, EntityKind, Entry, Membership, MetadataValue, PermissionEntity};

/// Default number of retries after a conflicting commit
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Plain in-memory DAO
///
/// Entities are keyed by lower-cased name. Memberships live in their own list
/// so a player may hold memberships without owning an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDao {
    #[serde(default)]
    players: BTreeMap<String, PermissionEntity>,
    #[serde(default)]
    groups: BTreeMap<String, PermissionEntity>,
    #[serde(default)]
    memberships: Vec<Membership>,
}

impl MemoryDao {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: EntityKind) -> &BTreeMap<String, PermissionEntity> {
        match kind {
            EntityKind::Player => &self.players,
            EntityKind::Group => &self.groups,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, PermissionEntity> {
        match kind {
            EntityKind::Player => &mut self.players,
            EntityKind::Group => &mut self.groups,
        }
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut PermissionEntity> {
        self.groups
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| PermissionError::MissingGroup(name.to_string()))
    }

    /// Entity to write into; players spring into existence, groups must exist
    fn writable(&mut self, name: &str, kind: EntityKind) -> Result<&mut PermissionEntity> {
        match kind {
            EntityKind::Group => self.group_mut(name),
            EntityKind::Player => Ok(self
                .players
                .entry(name.to_lowercase())
                .or_insert_with(|| PermissionEntity::new(name, EntityKind::Player))),
        }
    }

    fn memberships_of(&self, name: &str, kind: EntityKind) -> Vec<Membership> {
        self.memberships
            .iter()
            .filter(|m| match kind {
                EntityKind::Player => same_name(&m.member, name),
                EntityKind::Group => same_name(&m.group, name),
            })
            .cloned()
            .collect()
    }
}

impl PermissionDao for MemoryDao {
    fn entity(&self, name: &str, kind: EntityKind) -> Result<Option<PermissionEntity>> {
        Ok(self.table(kind).get(&name.to_lowercase()).map(|stored| {
            let mut entity = stored.clone();
            entity.memberships = self.memberships_of(name, kind);
            entity
        }))
    }

    fn entity_names(&self, kind: EntityKind) -> Result<Vec<String>> {
        Ok(self
            .table(kind)
            .values()
            .map(|e| e.display_name.clone())
            .collect())
    }

    fn permission(
        &self,
        name: &str,
        kind: EntityKind,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
    ) -> Result<Option<bool>> {
        Ok(self
            .table(kind)
            .get(&name.to_lowercase())
            .and_then(|e| e.entry(region, world, permission))
            .map(|e| e.value))
    }

    fn set_permission(
        &mut self,
        name: &str,
        kind: EntityKind,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
        value: bool,
    ) -> Result<()> {
        self.writable(name, kind)?
            .set_entry(Entry::new(region, world, permission, value));
        Ok(())
    }

    fn unset_permission(
        &mut self,
        name: &str,
        kind: EntityKind,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
    ) -> Result<bool> {
        Ok(self
            .table_mut(kind)
            .get_mut(&name.to_lowercase())
            .is_some_and(|e| e.unset_entry(region, world, permission)))
    }

    fn groups(&self, player: &str) -> Result<Vec<Membership>> {
        Ok(self.memberships_of(player, EntityKind::Player))
    }

    fn add_member(
        &mut self,
        group: &str,
        player: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let group_name = self.group_mut(group)?.display_name.clone();

        let existing = self.memberships.iter_mut().find(|m| {
            same_name(&m.group, group) && same_name(&m.member, player)
        });
        match existing {
            Some(m) => m.expiration = expiration,
            None => self
                .memberships
                .push(Membership::new(&group_name, player, expiration)),
        }
        Ok(())
    }

    fn remove_member(&mut self, group: &str, player: &str) -> Result<bool> {
        let before = self.memberships.len();
        self.memberships.retain(|m| {
            !(same_name(&m.group, group) && same_name(&m.member, player))
        });
        Ok(self.memberships.len() != before)
    }

    fn set_parents(&mut self, group: &str, parents: &[String]) -> Result<()> {
        let mut resolved = Vec::with_capacity(parents.len());
        for parent in parents {
            let display = self
                .groups
                .get(&parent.to_lowercase())
                .map(|p| p.display_name.clone())
                .ok_or_else(|| PermissionError::MissingGroup(parent.clone()))?;
            if !resolved.iter().any(|p: &String| same_name(p, &display)) {
                resolved.push(display);
            }
        }
        self.group_mut(group)?.parents = resolved;
        Ok(())
    }

    fn set_priority(&mut self, group: &str, priority: i32) -> Result<()> {
        self.group_mut(group)?.priority = priority;
        Ok(())
    }

    fn create_group(&mut self, name: &str) -> Result<bool> {
        let key = name.to_lowercase();
        if self.groups.contains_key(&key) {
            return Ok(false);
        }
        self.groups
            .insert(key, PermissionEntity::new(name, EntityKind::Group));
        Ok(true)
    }

    fn delete_entity(&mut self, name: &str, kind: EntityKind) -> Result<bool> {
        let removed = self.table_mut(kind).remove(&name.to_lowercase()).is_some();

        let before = self.memberships.len();
        self.memberships.retain(|m| match kind {
            EntityKind::Player => !same_name(&m.member, name),
            EntityKind::Group => !same_name(&m.group, name),
        });

        Ok(removed || self.memberships.len() != before)
    }

    fn metadata(&self, name: &str, kind: EntityKind, key: &str) -> Result<Option<MetadataValue>> {
        Ok(self
            .table(kind)
            .get(&name.to_lowercase())
            .and_then(|e| e.metadata.get(&key.to_lowercase()).cloned()))
    }

    fn set_metadata(
        &mut self,
        name: &str,
        kind: EntityKind,
        key: &str,
        value: MetadataValue,
    ) -> Result<()> {
        self.writable(name, kind)?
            .metadata
            .insert(key.to_lowercase(), value);
        Ok(())
    }

    fn unset_metadata(&mut self, name: &str, kind: EntityKind, key: &str) -> Result<bool> {
        Ok(self
            .table_mut(kind)
            .get_mut(&name.to_lowercase())
            .is_some_and(|e| e.metadata.remove(&key.to_lowercase()).is_some()))
    }
}

struct Versioned {
    version: u64,
    dao: MemoryDao,
}

/// Retrying transaction executor over a shared [`MemoryDao`]
pub struct MemoryStore {
    state: RwLock<Versioned>,
    max_retries: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_dao(MemoryDao::new())
    }

    /// Start from existing data
    pub fn from_dao(dao: MemoryDao) -> Self {
        Self {
            state: RwLock::new(Versioned { version: 0, dao }),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set how often a conflicting unit of work is retried
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Number of commits so far
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Copy of the committed data
    pub fn snapshot(&self) -> MemoryDao {
        self.state.read().dao.clone()
    }

    /// Export the committed data as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.state.read().dao)
            .map_err(|e| PermissionError::Storage(e.to_string()))
    }

    /// Build a store from a JSON export
    pub fn from_json(json: &str) -> Result<Self> {
        let dao: MemoryDao =
            serde_json::from_str(json).map_err(|e| PermissionError::Storage(e.to_string()))?;
        Ok(Self::from_dao(dao))
    }

    fn commit(&self, version: u64, dao: MemoryDao) -> Result<()> {
        let mut state = self.state.write();
        if state.version != version {
            return Err(PermissionError::Conflict);
        }
        state.dao = dao;
        state.version += 1;
        Ok(())
    }
}

impl TransactionStrategy for MemoryStore {
    type Dao = MemoryDao;

    fn execute<T, F>(&self, mut work: F) -> Result<T>
    where
        F: FnMut(&mut MemoryDao) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let (version, mut dao) = {
                let state = self.state.read();
                (state.version, state.dao.clone())
            };

            let outcome = work(&mut dao).and_then(|value| {
                self.commit(version, dao)?;
                Ok(value)
            });

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    tracing::debug!("Transaction attempt {} failed ({}), retrying", attempt, e);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Transaction gave up after {} attempts", attempt);
                    return Err(PermissionError::RetriesExhausted { attempts: attempt });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn execute_read_only<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&MemoryDao) -> Result<T>,
    {
        let state = self.state.read();
        work(&state.dao)
    }
}

impl<S: TransactionStrategy> TransactionStrategy for Arc<S> {
    type Dao = S::Dao;

    fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnMut(&mut Self::Dao) -> Result<T>,
    {
        (**self).execute(work)
    }

    fn execute_read_only<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Self::Dao) -> Result<T>,
    {
        (**self).execute_read_only(work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_group_must_exist_for_writes() {
        let mut dao = MemoryDao::new();

        let err = dao
            .set_permission("vip", EntityKind::Group, None, None, "fly", true)
            .unwrap_err();
        assert!(matches!(err, PermissionError::MissingGroup(g) if g == "vip"));

        // Players are created on first assignment
        dao.set_permission("Alice", EntityKind::Player, None, None, "fly", true)
            .unwrap();
        let alice = dao.entity("alice", EntityKind::Player).unwrap().unwrap();
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(
            dao.permission("ALICE", EntityKind::Player, None, None, "FLY").unwrap(),
            Some(true)
        );
    }

    #[test]
    fn test_add_member_refreshes_expiration() {
        let mut dao = MemoryDao::new();
        dao.create_group("VIP").unwrap();

        let later = Utc::now() + chrono::Duration::days(1);
        dao.add_member("vip", "bob", Some(later)).unwrap();
        dao.add_member("VIP", "Bob", None).unwrap();

        let groups = dao.groups("bob").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group, "VIP");
        assert_eq!(groups[0].expiration, None);

        assert!(matches!(
            dao.add_member("missing", "bob", None),
            Err(PermissionError::MissingGroup(_))
        ));
    }

    #[test]
    fn test_memberships_fold_non_ascii_names() {
        let mut dao = MemoryDao::new();
        dao.create_group("Élite").unwrap();

        dao.add_member("élite", "Özil", None).unwrap();
        dao.add_member("ÉLITE", "özil", None).unwrap();
        assert_eq!(dao.groups("ÖZIL").unwrap().len(), 1);
        assert_eq!(dao.groups("özil").unwrap()[0].group, "Élite");

        let elite = dao.entity("élite", EntityKind::Group).unwrap().unwrap();
        assert_eq!(elite.memberships.len(), 1);

        assert!(dao.remove_member("élite", "ÖZIL").unwrap());
        assert!(dao.groups("özil").unwrap().is_empty());

        dao.add_member("Élite", "özil", None).unwrap();
        assert!(dao.delete_entity("ÉLITE", EntityKind::Group).unwrap());
        assert!(dao.groups("özil").unwrap().is_empty());
    }

    #[test]
    fn test_delete_group_leaves_children_dangling() {
        let mut dao = MemoryDao::new();
        dao.create_group("base").unwrap();
        dao.create_group("child").unwrap();
        dao.set_parents("child", &["base".to_string()]).unwrap();
        dao.add_member("base", "carol", None).unwrap();
        dao.set_permission("base", EntityKind::Group, None, None, "x", true)
            .unwrap();

        assert!(dao.delete_entity("base", EntityKind::Group).unwrap());
        assert!(dao.entity("base", EntityKind::Group).unwrap().is_none());
        assert!(dao.groups("carol").unwrap().is_empty());

        let child = dao.entity("child", EntityKind::Group).unwrap().unwrap();
        assert_eq!(child.parents, vec!["base".to_string()]);

        assert!(!dao.delete_entity("base", EntityKind::Group).unwrap());
    }

    #[test]
    fn test_set_parents_requires_existing_groups() {
        let mut dao = MemoryDao::new();
        dao.create_group("child").unwrap();
        assert!(matches!(
            dao.set_parents("child", &["ghost".to_string()]),
            Err(PermissionError::MissingGroup(g)) if g == "ghost"
        ));
    }

    #[test]
    fn test_failed_unit_leaves_no_trace() {
        let store = MemoryStore::new();

        let result: Result<()> = store.execute(|dao| {
            dao.create_group("temp")?;
            Err(PermissionError::MissingGroup("other".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.version(), 0);
        assert!(store.snapshot().entity("temp", EntityKind::Group).unwrap().is_none());
    }

    #[test]
    fn test_conflicting_commit_is_retried() {
        let store = MemoryStore::new();
        let attempts = Cell::new(0);

        store
            .execute(|dao| {
                attempts.set(attempts.get() + 1);
                if attempts.get() == 1 {
                    // Someone else commits while this unit is in flight
                    store.execute(|other| other.create_group("racer"))?;
                }
                dao.create_group("mine")
            })
            .unwrap();

        assert_eq!(attempts.get(), 2);
        let snapshot = store.snapshot();
        assert!(snapshot.entity("racer", EntityKind::Group).unwrap().is_some());
        assert!(snapshot.entity("mine", EntityKind::Group).unwrap().is_some());
    }

    #[test]
    fn test_retries_exhausted() {
        let store = MemoryStore::new().with_max_retries(2);
        let attempts = Cell::new(0);

        let result: Result<()> = store.execute(|_| {
            attempts.set(attempts.get() + 1);
            Err(PermissionError::Conflict)
        });

        assert!(matches!(
            result,
            Err(PermissionError::RetriesExhausted { attempts: 3 })
        ));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_json_export_import() {
        let store = MemoryStore::new();
        store
            .execute(|dao| {
                dao.create_group("admins")?;
                dao.set_priority("admins", 50)?;
                dao.set_metadata("admins", EntityKind::Group, "prefix", "[A]".into())?;
                dao.add_member("admins", "dave", None)
            })
            .unwrap();

        let json = store.to_json().unwrap();
        let restored = MemoryStore::from_json(&json).unwrap();
        assert_eq!(restored.snapshot(), store.snapshot());

        assert!(matches!(
            MemoryStore::from_json("not json"),
            Err(PermissionError::Storage(_))
        ));
    }
}
