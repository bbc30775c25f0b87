//! zperms - Permission Resolution Core
//!
//! This crate computes effective permissions for players and groups out of a
//! hierarchy of groups with world- and region-qualified entries, and carries
//! the administrative operations around it: rank tracks, clone/rename,
//! memberships with expiration and permission diffs.
//!
//! # Layout
//!
//! - [`permissions`] - Qualified permission codec, child expansion and diffs
//! - [`model`] - Players, groups, entries, memberships and metadata
//! - [`resolver`] - Ancestor closure and the merge of entries into one map
//! - [`rank`] - Track positions and promote/demote planning
//! - [`dao`] - Storage seams plus the in-memory reference store
//! - [`events`] - Cache invalidation signals for the host
//! - [`config`] - TOML configuration
//!
//! [`ZPermsCore`] ties these together; every operation runs inside one
//! transaction of the configured [`TransactionStrategy`].

pub mod config;
pub mod dao;
pub mod error;
pub mod events;
pub mod model;
pub mod permissions;
pub mod rank;
pub mod resolver;
pub mod service;

// Re-export the facade
pub use service::{Clock, DiffReport, ZPermsCore};

// Re-export error types
pub use error::{PermissionError, Result};

// Re-export config types
pub use config::{ConfigError, ConfigResult, ZPermsConfig};

// Re-export storage seams
pub use dao::{MemoryDao, MemoryStore, PermissionDao, TransactionStrategy};

// Re-export events
pub use events::{Invalidation, InvalidationListeners, ListenerKey, RefreshCause};

// Re-export model types
pub use model::{EntityKind, Entry, Membership, MetadataValue, PermissionEntity};

// Re-export permission types and functions
pub use permissions::{
    ancestors, check_dynamic_permission, diff, expand, filter_permissions, PermissionDiff,
    PermissionMap, QualifiedPermission,
};

// Re-export rank and resolution types
pub use rank::{Authority, Console, RankAction, RankChange, Track};
pub use resolver::{PermissionsResolver, ResolvedPermissions};
