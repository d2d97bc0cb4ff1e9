use serde::Serialize;
use utoipa::ToSchema;

use crate::state::lifecycle::BattleStatus;

/// Publicly visible battle status exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibleBattleStatus {
    /// Players are choosing their remix.
    Selecting,
    /// First player's round.
    PlayingP1,
    /// Second player's round.
    PlayingP2,
    /// Audience vote.
    Voting,
    /// Battle is over.
    Completed,
}

impl From<BattleStatus> for VisibleBattleStatus {
    fn from(value: BattleStatus) -> Self {
        match value {
            BattleStatus::Selecting => VisibleBattleStatus::Selecting,
            BattleStatus::PlayingP1 => VisibleBattleStatus::PlayingP1,
            BattleStatus::PlayingP2 => VisibleBattleStatus::PlayingP2,
            BattleStatus::Voting => VisibleBattleStatus::Voting,
            BattleStatus::Completed => VisibleBattleStatus::Completed,
        }
    }
}
