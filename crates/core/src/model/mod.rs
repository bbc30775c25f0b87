//! Data model for players, groups and their permission facts
//!
//! Every type here is a plain value loaded from the DAO for the duration of a
//! single operation. Nothing in this module is cached between calls.

mod entity;
mod membership;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use entity::{Entry, MetadataValue, PermissionEntity};
pub use membership::{filter_expired, Membership};

/// Metadata key holding the chat prefix
pub const PREFIX_KEY: &str = "prefix";

/// Metadata key holding the chat suffix
pub const SUFFIX_KEY: &str = "suffix";

/// Compare two names the way entities are keyed
///
/// Names are stored under their full Unicode lower-case form, so every
/// comparison against a stored name must fold the same way.
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Disjoint kinds of permission holders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Group,
}

impl EntityKind {
    /// Build from the `isGroup` flag used throughout the DAO contract
    pub fn from_is_group(group: bool) -> Self {
        if group {
            Self::Group
        } else {
            Self::Player
        }
    }

    pub fn is_group(self) -> bool {
        self == Self::Group
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => f.write_str("Player"),
            Self::Group => f.write_str("Group"),
        }
    }
}
