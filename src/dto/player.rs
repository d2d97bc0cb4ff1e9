use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, validation::validate_taste_profile},
};

/// Replace a player's taste profile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateTasteRequest {
    /// Genre to non-negative weight.
    #[validate(custom(function = "validate_taste_profile"))]
    pub taste_profile: BTreeMap<String, f64>,
}

/// Public projection of a player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub taste_profile: BTreeMap<String, f64>,
    pub created_at: String,
    pub last_active_at: String,
}

impl From<PlayerEntity> for PlayerView {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            taste_profile: value.taste_profile,
            created_at: format_system_time(value.created_at),
            last_active_at: format_system_time(value.last_active_at),
        }
    }
}
