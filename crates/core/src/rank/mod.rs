//! Rank tracks
//!
//! A track is an ordered list of groups, lowest rank first. A player's rank
//! is never stored: it is the position of the one track group among the
//! player's live memberships.
//!
//! ```text
//! track:   recruit ── member ── veteran
//! promote  (none) ─► recruit ─► member ─► veteran ─► veteran
//! demote   recruit ─► (none)     member ─► recruit
//! ```
//!
//! This module only decides *what* should change. Applying a [`RankChange`]
//! to storage happens inside one transaction in
//! [`ZPermsCore`](crate::ZPermsCore).

use std::fmt;

use crate::error::{PermissionError, Result};
use crate::model::same_name;
use crate::permissions::PermissionMap;

/// Ordered group ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    name: String,
    groups: Vec<String>,
}

impl Track {
    /// Build a track; fails if it has no groups
    pub fn new<I, S>(name: &str, groups: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups: Vec<String> = groups
            .into_iter()
            .map(|g| g.as_ref().to_lowercase())
            .collect();
        if groups.is_empty() {
            return Err(PermissionError::TrackNotDefined(name.to_string()));
        }
        Ok(Self {
            name: name.to_lowercase(),
            groups,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Position of a group on the track
    pub fn position(&self, group: &str) -> Option<usize> {
        self.groups.iter().position(|g| same_name(g, group))
    }

    /// Derive the rank index from a player's live group names
    ///
    /// `None` means the player is unranked on this track. Holding two or more
    /// track groups is ambiguous and reported with the groups in track order.
    pub fn current_rank<S: AsRef<str>>(&self, player_groups: &[S]) -> Result<Option<usize>> {
        let mut matches: Vec<usize> = player_groups
            .iter()
            .filter_map(|g| self.position(g.as_ref()))
            .collect();
        matches.sort_unstable();
        matches.dedup();

        match matches.as_slice() {
            [] => Ok(None),
            [index] => Ok(Some(*index)),
            _ => Err(PermissionError::AmbiguousRank {
                track: self.name.clone(),
                groups: matches.iter().map(|&i| self.groups[i].clone()).collect(),
            }),
        }
    }
}

/// Rank operation requested by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankAction {
    Promote,
    Demote,
    SetRank(String),
    UnsetRank,
}

impl RankAction {
    /// Name used in the guarding permission nodes
    pub fn name(&self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::SetRank(_) => "setrank",
            Self::UnsetRank => "unsetrank",
        }
    }

    /// Permissions of which the caller must hold at least one
    pub fn required_permissions(&self, track: &str) -> Vec<String> {
        let track = track.to_lowercase();
        vec![
            format!("zpermissions.{}.{}", self.name(), track),
            format!("zpermissions.{}.*", self.name()),
            format!("zpermissions.rank.{}", track),
            "zpermissions.rank.*".to_string(),
        ]
    }
}

/// Membership change decided for one rank operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankChange {
    /// Unranked player joins a group
    Added { group: String },
    /// Player joins `to` and, if different, leaves `from`
    Changed { from: String, to: String },
    /// Player leaves the track entirely
    Removed { group: String },
}

impl RankChange {
    /// Group the player joins, if any
    pub fn joins(&self) -> Option<&str> {
        match self {
            Self::Added { group } => Some(group),
            Self::Changed { to, .. } => Some(to),
            Self::Removed { .. } => None,
        }
    }

    /// Group the player leaves, if any
    pub fn leaves(&self) -> Option<&str> {
        match self {
            Self::Added { .. } => None,
            Self::Changed { from, to } if same_name(from, to) => None,
            Self::Changed { from, .. } => Some(from),
            Self::Removed { group } => Some(group),
        }
    }
}

impl fmt::Display for RankChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { group } => write!(f, "added to {}", group),
            Self::Changed { from, to } => write!(f, "moved from {} to {}", from, to),
            Self::Removed { group } => write!(f, "removed from {}", group),
        }
    }
}

/// Decide the membership change for `action`
///
/// `current` is the player's rank index as returned by
/// [`Track::current_rank`].
pub fn plan(
    track: &Track,
    player: &str,
    current: Option<usize>,
    action: &RankAction,
) -> Result<RankChange> {
    let not_on_track = || PermissionError::NotOnTrack {
        player: player.to_string(),
        track: track.name.clone(),
    };
    let last = track.groups.len() - 1;

    let change = match (action, current) {
        (RankAction::Promote, None) => RankChange::Added {
            group: track.groups[0].clone(),
        },
        (RankAction::Promote, Some(i)) => RankChange::Changed {
            from: track.groups[i].clone(),
            to: track.groups[(i + 1).min(last)].clone(),
        },
        (RankAction::Demote, None) | (RankAction::UnsetRank, None) => return Err(not_on_track()),
        (RankAction::Demote, Some(0)) => RankChange::Removed {
            group: track.groups[0].clone(),
        },
        (RankAction::Demote, Some(i)) => RankChange::Changed {
            from: track.groups[i].clone(),
            to: track.groups[i - 1].clone(),
        },
        (RankAction::SetRank(rank), current) => {
            let target = track
                .position(rank)
                .map(|i| track.groups[i].clone())
                .ok_or_else(|| PermissionError::RankNotInTrack {
                    rank: rank.clone(),
                    track: track.name.clone(),
                })?;
            match current {
                None => RankChange::Added { group: target },
                Some(i) => RankChange::Changed {
                    from: track.groups[i].clone(),
                    to: target,
                },
            }
        }
        (RankAction::UnsetRank, Some(i)) => RankChange::Removed {
            group: track.groups[i].clone(),
        },
    };

    Ok(change)
}

/// Permission source of whoever requests a rank change
pub trait Authority {
    fn has_permission(&self, permission: &str) -> bool;
}

impl Authority for PermissionMap {
    fn has_permission(&self, permission: &str) -> bool {
        self.get(&permission.to_lowercase()).copied().unwrap_or(false)
    }
}

/// Unrestricted caller such as the server console
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl Authority for Console {
    fn has_permission(&self, _permission: &str) -> bool {
        true
    }
}

/// Require one of the permissions guarding `action` on `track`
pub fn authorize<A>(actor: &A, action: &RankAction, track: &str) -> Result<()>
where
    A: Authority + ?Sized,
{
    let required = action.required_permissions(track);
    if required.iter().any(|p| actor.has_permission(p)) {
        Ok(())
    } else {
        Err(PermissionError::NotAuthorized { required })
    }
}
