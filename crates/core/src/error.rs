//! Error types for permission resolution and mutation

use crate::config::ConfigError;
use crate::model::EntityKind;

/// Error type for every operation exposed by the core
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// Permission string that cannot be split into region, world and node
    #[error("Malformed permission '{permission}': {reason}")]
    MalformedPermission {
        permission: String,
        reason: &'static str,
    },

    /// Referenced player or group does not exist
    #[error("{kind} {name} does not exist")]
    EntityNotFound { kind: EntityKind, name: String },

    /// A group referenced by a membership, parent link or entry is absent
    #[error("Group {0} does not exist")]
    MissingGroup(String),

    /// Parent assignment would close a loop in the group hierarchy
    #[error("Setting {parent} as parent of {group} would create a cycle")]
    CyclicHierarchy { group: String, parent: String },

    /// Attempt to touch the reserved dynamic permission namespace
    #[error("Permission {0} is reserved and cannot be modified")]
    ProtectedPermission(String),

    /// Player holds more than one group of the same track
    #[error("Player is in more than one group in track {track}: {}", groups.join(", "))]
    AmbiguousRank { track: String, groups: Vec<String> },

    /// Rank operation needs a current rank but the player has none
    #[error("Player {player} is not in any group in track {track}")]
    NotOnTrack { player: String, track: String },

    /// Named track is missing from the configuration or empty
    #[error("Track {0} has not been defined")]
    TrackNotDefined(String),

    /// Requested rank is not one of the track's groups
    #[error("Rank {rank} is not in track {track}")]
    RankNotInTrack { rank: String, track: String },

    /// Caller holds none of the permissions guarding a rank operation
    #[error("Missing permission, one of: {}", required.join(", "))]
    NotAuthorized { required: Vec<String> },

    /// Clone source has neither an entity nor memberships
    #[error("{kind} {name} does not exist")]
    SourceNotFound { kind: EntityKind, name: String },

    /// Clone destination is already taken
    #[error("{kind} {name} already exists. Purge it if you really want to overwrite")]
    DestinationExists { kind: EntityKind, name: String },

    /// Concurrent commit invalidated the transaction snapshot
    #[error("Transaction conflict")]
    Conflict,

    /// Transaction kept conflicting past the retry budget
    #[error("Transaction failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PermissionError {
    /// Whether the transaction executor may retry the unit of work
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Result type for permission operations
pub type Result<T> = std::result::Result<T, PermissionError>;
