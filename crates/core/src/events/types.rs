//! Invalidation event types

use std::fmt;

/// Why a player's resolved permissions must be recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshCause {
    /// Direct permission or metadata change on the player
    Command,
    /// Membership or rank change
    GroupChange,
    /// An expired membership was swept
    ExpirationSwept,
}

/// Signal to the host that cached state is stale
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// One player's resolved permissions changed
    Player { name: String, cause: RefreshCause },
    /// A group changed; every player inheriting from it is affected
    AffectedPlayers { group: String },
    /// Membership expirations changed, for one player or everyone
    Expirations { player: Option<String> },
}

impl Invalidation {
    pub fn player(name: &str, cause: RefreshCause) -> Self {
        Self::Player {
            name: name.to_string(),
            cause,
        }
    }

    pub fn group(group: &str) -> Self {
        Self::AffectedPlayers {
            group: group.to_string(),
        }
    }

    pub fn expirations(player: Option<&str>) -> Self {
        Self::Expirations {
            player: player.map(str::to_string),
        }
    }
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player { name, cause } => write!(f, "refresh player {} ({:?})", name, cause),
            Self::AffectedPlayers { group } => write!(f, "refresh members of {}", group),
            Self::Expirations { player: Some(p) } => write!(f, "refresh expirations of {}", p),
            Self::Expirations { player: None } => f.write_str("refresh all expirations"),
        }
    }
}

/// Type alias for invalidation callbacks
pub type InvalidationCallback = Box<dyn Fn(&Invalidation) + Send + Sync>;
