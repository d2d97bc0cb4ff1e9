use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::matchmaking::MatchMode;

/// Matching policy requested by a queued player.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchModeDto {
    /// Prefer a partner with a close taste.
    Similar,
    /// Prefer a partner with a distant taste.
    Opposite,
    /// Prefer a partner halfway between.
    #[default]
    Balanced,
}

impl From<MatchModeDto> for MatchMode {
    fn from(value: MatchModeDto) -> Self {
        match value {
            MatchModeDto::Similar => MatchMode::Similar,
            MatchModeDto::Opposite => MatchMode::Opposite,
            MatchModeDto::Balanced => MatchMode::Balanced,
        }
    }
}

/// Join (or re-join) the matchmaking queue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinQueueRequest {
    pub player_id: Uuid,
    /// Defaults to `balanced`.
    #[serde(default)]
    pub mode: MatchModeDto,
}

/// Leave the matchmaking queue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LeaveQueueRequest {
    pub player_id: Uuid,
}

/// Battle a queued player was paired into.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct MatchView {
    pub battle_id: Uuid,
    pub opponent_id: Uuid,
    pub sound_id: Uuid,
}

/// Response of a join request.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinQueueResponse {
    pub queue_id: Uuid,
    /// Advisory 1-based position at the time of the call; absent once matched.
    pub position: Option<usize>,
    /// Present when joining immediately produced a battle.
    pub matched: Option<MatchView>,
}

/// Response of a leave request.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveQueueResponse {
    /// Whether an entry was removed.
    pub left: bool,
}

/// Response of a status poll.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatusResponse {
    pub queued: bool,
    pub position: Option<usize>,
    /// Battle the player was matched into since their last join.
    pub matched: Option<MatchView>,
}
