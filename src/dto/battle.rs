use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    dto::{format_system_time, phase::VisibleBattleStatus},
    state::battle::{Battle, RemixSelection},
};

/// Payload used to create a battle directly, bypassing the queue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_distinct_players"))]
pub struct CreateBattleRequest {
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub sound_id: Uuid,
    /// Optional context tag (max 64 characters).
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub scene: Option<String>,
}

fn validate_distinct_players(request: &CreateBattleRequest) -> Result<(), ValidationError> {
    if request.player1_id == request.player2_id {
        let mut err = ValidationError::new("distinct_players");
        err.message = Some("A battle needs two different players".into());
        return Err(err);
    }
    Ok(())
}

/// Remix pick submitted by a participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectRemixRequest {
    pub player_id: Uuid,
    pub remix_id: Uuid,
}

/// Request to end the current timed phase early.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdvanceBattleRequest {
    pub player_id: Uuid,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a remix selection.
pub struct RemixSelectionView {
    pub player_id: Uuid,
    pub remix_id: Uuid,
    pub selected_at: String,
}

impl From<&RemixSelection> for RemixSelectionView {
    fn from(value: &RemixSelection) -> Self {
        Self {
            player_id: value.player_id,
            remix_id: value.remix_id,
            selected_at: format_system_time(value.selected_at),
        }
    }
}

/// Battle as returned by the REST API and the `battle.created` event.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct BattleView {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub sound_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    pub status: VisibleBattleStatus,
    pub remix_selections: Vec<RemixSelectionView>,
    /// Deadline of the current timed phase (RFC 3339).
    pub playing_ends_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl From<&Battle> for BattleView {
    fn from(battle: &Battle) -> Self {
        Self {
            id: battle.id,
            player1_id: battle.player1_id,
            player2_id: battle.player2_id,
            sound_id: battle.sound_id,
            scene: battle.scene.clone(),
            status: battle.status.into(),
            remix_selections: battle
                .remix_selections
                .iter()
                .map(RemixSelectionView::from)
                .collect(),
            playing_ends_at: battle.playing_ends_at.map(format_system_time),
            created_at: format_system_time(battle.created_at),
            updated_at: format_system_time(battle.updated_at),
            completed_at: battle.completed_at.map(format_system_time),
        }
    }
}

/// Response of a remix selection.
#[derive(Debug, Serialize, ToSchema)]
pub struct SelectRemixResponse {
    /// The caller's selection, absent when the battle was already completed.
    pub selection: Option<RemixSelectionView>,
    pub both_selected: bool,
    pub status: VisibleBattleStatus,
    pub battle: BattleView,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(player1_id: Uuid, player2_id: Uuid, scene: Option<&str>) -> CreateBattleRequest {
        CreateBattleRequest {
            player1_id,
            player2_id,
            sound_id: Uuid::new_v4(),
            scene: scene.map(str::to_string),
        }
    }

    #[test]
    fn same_player_twice_is_rejected() {
        let player = Uuid::new_v4();
        assert!(request(player, player, None).validate().is_err());
        assert!(
            request(player, Uuid::new_v4(), Some("club"))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn scene_length_is_bounded() {
        let long = "s".repeat(65);
        assert!(
            request(Uuid::new_v4(), Uuid::new_v4(), Some(&long))
                .validate()
                .is_err()
        );
        assert!(
            request(Uuid::new_v4(), Uuid::new_v4(), Some(""))
                .validate()
                .is_err()
        );
    }
}
