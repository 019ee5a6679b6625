//! Rank ladders: ordered groups a user is promoted or demoted along.
//!
//! Rank 1 is the top of a ladder; 0 means the group is unranked. A user's
//! position is the best-ranked ladder group among their common parents.

use crate::entity::PermissionEntity;
use crate::error::PermissionsResult;
use crate::manager::PermissionManager;
use sitegate_types::{EntityRef, RankingError, RankingFailure, COMMON_SITE};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl PermissionManager {
    /// Ranked groups on `ladder`, highest rank first.
    pub fn rank_ladder(&self, ladder: &str) -> PermissionsResult<Vec<Arc<PermissionEntity>>> {
        let mut groups: Vec<_> = self
            .groups()?
            .into_iter()
            .filter(|group| group.is_ranked() && self.ladder_of(group) == ladder)
            .collect();
        groups.sort_by_cached_key(|group| (group.rank(), group.name().to_string()));
        Ok(groups)
    }

    /// Moves `user` one step up `ladder` (the default ladder if `None`).
    /// A `None` promoter is the system and skips rank checks. Returns the
    /// group the user now belongs to.
    pub fn promote(
        &self,
        user: &str,
        promoter: Option<&str>,
        ladder: Option<&str>,
    ) -> PermissionsResult<Arc<PermissionEntity>> {
        self.change_rank(user, promoter, ladder, Direction::Up)
    }

    pub fn demote(
        &self,
        user: &str,
        promoter: Option<&str>,
        ladder: Option<&str>,
    ) -> PermissionsResult<Arc<PermissionEntity>> {
        self.change_rank(user, promoter, ladder, Direction::Down)
    }

    fn change_rank(
        &self,
        user: &str,
        promoter: Option<&str>,
        ladder: Option<&str>,
        direction: Direction,
    ) -> PermissionsResult<Arc<PermissionEntity>> {
        let ladder = ladder.unwrap_or(&self.config().default_ladder).to_string();
        let groups = self.rank_ladder(&ladder)?;
        let target = self.user(user)?;
        let fail = |failure| {
            RankingError::new(
                target.entity_ref().clone(),
                promoter.map(EntityRef::user),
                ladder.clone(),
                failure,
            )
        };

        let index = position_on(&target, &groups).ok_or_else(|| fail(RankingFailure::NotInLadder))?;
        let destination = match direction {
            Direction::Up if index == 0 => return Err(fail(RankingFailure::AlreadyHighest).into()),
            Direction::Up => &groups[index - 1],
            Direction::Down if index + 1 == groups.len() => {
                return Err(fail(RankingFailure::AlreadyLowest).into());
            }
            Direction::Down => &groups[index + 1],
        };
        let current = &groups[index];

        if let Some(name) = promoter {
            let promoter = self.user(name)?;
            let promoter_rank = position_on(&promoter, &groups)
                .map(|i| groups[i].rank())
                .ok_or_else(|| fail(RankingFailure::PromoterNotRanked))?;
            if promoter_rank >= current.rank() || promoter_rank >= destination.rank() {
                return Err(fail(RankingFailure::PromoterRankTooLow).into());
            }
        }

        let parents: Vec<String> = target
            .parent_names(COMMON_SITE)
            .into_iter()
            .filter(|name| name != current.name())
            .chain(std::iter::once(destination.name().to_string()))
            .collect();
        target.set_parents_for_rank(parents, COMMON_SITE)?;

        info!(
            user = %user,
            from = %current.name(),
            to = %destination.name(),
            ladder = %ladder,
            "User rank changed"
        );
        Ok(destination.clone())
    }

    fn ladder_of(&self, group: &PermissionEntity) -> String {
        group
            .rank_ladder()
            .unwrap_or_else(|| self.config().default_ladder.clone())
    }
}

/// Index of the best-ranked ladder group among the entity's common parents.
fn position_on(entity: &PermissionEntity, ladder: &[Arc<PermissionEntity>]) -> Option<usize> {
    let parents = entity.parent_names(COMMON_SITE);
    ladder
        .iter()
        .position(|group| parents.iter().any(|name| name == group.name()))
}
