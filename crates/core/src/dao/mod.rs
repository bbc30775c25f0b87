//! Storage seams
//!
//! The core never owns entity state. Everything it reads or writes goes
//! through a [`PermissionDao`] handed out by a [`TransactionStrategy`] for the
//! duration of one unit of work.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ZPermsCore                        │
//! │   resolve / set / clone / promote / ...              │
//! └───────────────┬──────────────────────────────────────┘
//!                 │ execute(unit of work)
//!                 ▼
//! ┌──────────────────────────────────────────────────────┐
//! │   TransactionStrategy (retry on transient conflict)  │
//! └───────────────┬──────────────────────────────────────┘
//!                 │ &mut Dao
//!                 ▼
//! ┌──────────────────────────────────────────────────────┐
//! │   PermissionDao (system of record)                   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! [`memory::MemoryStore`] is a complete in-process implementation of both
//! seams.

pub mod memory;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{EntityKind, Membership, MetadataValue, PermissionEntity};

pub use memory::{MemoryDao, MemoryStore};

/// Data access contract of the system of record
///
/// All names are case-insensitive. Operations that reference a group which
/// does not exist fail with [`PermissionError::MissingGroup`].
///
/// [`PermissionError::MissingGroup`]: crate::PermissionError::MissingGroup
pub trait PermissionDao {
    /// Load a player or group with its entries, metadata and memberships
    fn entity(&self, name: &str, kind: EntityKind) -> Result<Option<PermissionEntity>>;

    /// Display names of all entities of a kind
    fn entity_names(&self, kind: EntityKind) -> Result<Vec<String>>;

    /// Value of one stored entry
    fn permission(
        &self,
        name: &str,
        kind: EntityKind,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
    ) -> Result<Option<bool>>;

    /// Insert or overwrite an entry, creating absent players
    fn set_permission(
        &mut self,
        name: &str,
        kind: EntityKind,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
        value: bool,
    ) -> Result<()>;

    /// Remove an entry, returning whether it existed
    fn unset_permission(
        &mut self,
        name: &str,
        kind: EntityKind,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
    ) -> Result<bool>;

    /// Stored memberships of a player, expired ones included
    fn groups(&self, player: &str) -> Result<Vec<Membership>>;

    /// Add a membership, replacing the expiration of an existing one
    fn add_member(
        &mut self,
        group: &str,
        player: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Remove a membership, returning whether it existed
    fn remove_member(&mut self, group: &str, player: &str) -> Result<bool>;

    /// Replace the ordered parent list of a group
    fn set_parents(&mut self, group: &str, parents: &[String]) -> Result<()>;

    fn set_priority(&mut self, group: &str, priority: i32) -> Result<()>;

    /// Create a group, returning `false` if it already existed
    fn create_group(&mut self, name: &str) -> Result<bool>;

    /// Delete an entity with its entries, metadata and memberships
    ///
    /// Child groups keep their (now dangling) parent reference.
    fn delete_entity(&mut self, name: &str, kind: EntityKind) -> Result<bool>;

    fn metadata(&self, name: &str, kind: EntityKind, key: &str) -> Result<Option<MetadataValue>>;

    fn set_metadata(
        &mut self,
        name: &str,
        kind: EntityKind,
        key: &str,
        value: MetadataValue,
    ) -> Result<()>;

    fn unset_metadata(&mut self, name: &str, kind: EntityKind, key: &str) -> Result<bool>;
}

/// Executor of units of work against a [`PermissionDao`]
pub trait TransactionStrategy {
    type Dao: PermissionDao;

    /// Run a read-write unit of work atomically
    ///
    /// Units failing with a transient error are retried transparently, which
    /// is why `work` is `FnMut`. Any other error discards every change the
    /// unit made.
    fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnMut(&mut Self::Dao) -> Result<T>;

    /// Run a read-only unit of work without retry handling
    fn execute_read_only<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Self::Dao) -> Result<T>;
}
