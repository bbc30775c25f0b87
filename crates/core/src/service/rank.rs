//! Promote, demote and explicit rank assignment

use super::ZPermsCore;
use crate::dao::{PermissionDao, TransactionStrategy};
use crate::error::{PermissionError, Result};
use crate::events::{Invalidation, RefreshCause};
use crate::model::filter_expired;
use crate::rank::{authorize, plan, Authority, RankAction, RankChange, Track};

impl<S: TransactionStrategy> ZPermsCore<S> {
    /// Move a player one rank up, or onto the track's first group
    pub fn promote<A>(&self, actor: &A, player: &str, track: Option<&str>) -> Result<RankChange>
    where
        A: Authority + ?Sized,
    {
        self.change_rank(actor, player, track, RankAction::Promote)
    }

    /// Move a player one rank down, off the track below the first group
    pub fn demote<A>(&self, actor: &A, player: &str, track: Option<&str>) -> Result<RankChange>
    where
        A: Authority + ?Sized,
    {
        self.change_rank(actor, player, track, RankAction::Demote)
    }

    /// Put a player on a specific rank of a track
    pub fn set_rank<A>(
        &self,
        actor: &A,
        player: &str,
        rank: &str,
        track: Option<&str>,
    ) -> Result<RankChange>
    where
        A: Authority + ?Sized,
    {
        self.change_rank(actor, player, track, RankAction::SetRank(rank.to_lowercase()))
    }

    /// Remove a player from whatever rank they hold on a track
    pub fn unset_rank<A>(&self, actor: &A, player: &str, track: Option<&str>) -> Result<RankChange>
    where
        A: Authority + ?Sized,
    {
        self.change_rank(actor, player, track, RankAction::UnsetRank)
    }

    /// Look up a configured track, falling back to the default track
    pub fn track(&self, name: Option<&str>) -> Result<Track> {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_lowercase(),
            _ => self.config.default_track.clone(),
        };
        let groups = self
            .config
            .track(&name)
            .ok_or_else(|| PermissionError::TrackNotDefined(name.clone()))?;
        Track::new(&name, groups)
    }

    #[tracing::instrument(skip(self, actor))]
    fn change_rank<A>(
        &self,
        actor: &A,
        player: &str,
        track: Option<&str>,
        action: RankAction,
    ) -> Result<RankChange>
    where
        A: Authority + ?Sized,
    {
        let track = self.track(track)?;
        authorize(actor, &action, track.name())?;

        if let RankAction::SetRank(rank) = &action {
            if track.position(rank).is_none() {
                return Err(PermissionError::RankNotInTrack {
                    rank: rank.clone(),
                    track: track.name().to_string(),
                });
            }
        }

        let now = self.now();
        let outcome = self.storage.execute(|dao| {
            let mut live: Vec<String> = filter_expired(dao.groups(player)?, now)
                .into_iter()
                .map(|m| m.group)
                .collect();
            // Players without live memberships rank as the default group,
            // which is never stored for them
            if live.is_empty() {
                live.push(self.resolver.default_group().to_string());
            }
            let current = track.current_rank(live.as_slice())?;
            let change = plan(&track, player, current, &action)?;

            if let Some(group) = change.joins() {
                dao.add_member(group, player, None)?;
            }
            if let Some(group) = change.leaves() {
                dao.remove_member(group, player)?;
            }
            Ok(change)
        });

        match outcome {
            Ok(change) => {
                tracing::info!(
                    "{} {} on track {}: {}",
                    action.name(),
                    player,
                    track.name(),
                    change
                );
                self.fire(vec![
                    Invalidation::player(player, RefreshCause::GroupChange),
                    Invalidation::expirations(Some(player)),
                ]);
                Ok(change)
            }
            Err(e) => {
                tracing::warn!(
                    "{} {} on track {} aborted: {}",
                    action.name(),
                    player,
                    track.name(),
                    e
                );
                Err(e)
            }
        }
    }
}
