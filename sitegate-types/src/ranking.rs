//! Promotion and demotion failures.

use crate::EntityRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The specific reason a rank change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum RankingFailure {
    #[error("target is not on the ladder")]
    NotInLadder,

    #[error("promoter holds no rank on the ladder")]
    PromoterNotRanked,

    #[error("promoter's rank is not high enough")]
    PromoterRankTooLow,

    #[error("target already holds the highest rank")]
    AlreadyHighest,

    #[error("target already holds the lowest rank")]
    AlreadyLowest,
}

/// A refused rank change, carrying both parties for diagnostics.
///
/// A `None` promoter means the change was requested by the system itself.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("cannot change rank of {target} on ladder '{ladder}': {failure}")]
pub struct RankingError {
    pub target: EntityRef,
    pub promoter: Option<EntityRef>,
    pub ladder: String,
    pub failure: RankingFailure,
}

impl RankingError {
    pub fn new(
        target: EntityRef,
        promoter: Option<EntityRef>,
        ladder: impl Into<String>,
        failure: RankingFailure,
    ) -> Self {
        Self {
            target,
            promoter,
            ladder: ladder.into(),
            failure,
        }
    }
}
