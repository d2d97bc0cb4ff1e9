use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{battle::BattleView, phase::VisibleBattleStatus};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// Battle the event concerns, used to filter per-battle streams.
    pub battle_id: Option<Uuid>,
}

impl ServerEvent {
    /// Plain text event not tied to a battle.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self {
            event,
            data,
            battle_id: None,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
            battle_id: None,
        })
    }

    /// Tag the event with the battle it belongs to.
    pub fn for_battle(mut self, battle_id: Uuid) -> Self {
        self.battle_id = Some(battle_id);
        self
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `battle`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Battle the stream is restricted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after a participant picked (or re-picked) a remix.
pub struct RemixSelectedEvent {
    pub battle_id: Uuid,
    pub player_id: Uuid,
    pub remix_id: Uuid,
    pub both_selected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once per committed status change.
pub struct StateChangedEvent {
    pub battle_id: Uuid,
    pub previous_status: VisibleBattleStatus,
    pub new_status: VisibleBattleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playing_ends_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast when a battle is created.
pub struct BattleCreatedEvent(pub BattleView);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when two queued players were paired.
pub struct QueueMatchedEvent {
    pub battle_id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub sound_id: Uuid,
    pub similarity: f64,
}
