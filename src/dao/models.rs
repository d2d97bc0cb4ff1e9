use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Player known to the service, created on first contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Stable identifier supplied by the client.
    pub id: Uuid,
    /// Genre weights describing the player's taste.
    pub taste_profile: BTreeMap<String, f64>,
    /// First time the player was seen.
    pub created_at: SystemTime,
    /// Last interaction with the service.
    pub last_active_at: SystemTime,
}

/// Generated variant of a sound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemixEntity {
    /// Stable identifier for the remix.
    pub id: Uuid,
    /// Genre/style tag the remix was generated for.
    pub genre: String,
    /// URL pointing to the rendered audio.
    pub url: String,
    /// When the remix was generated.
    pub generated_at: SystemTime,
}

/// Sound battles are built around. Owns its remixes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoundEntity {
    /// Stable identifier for the sound.
    pub id: Uuid,
    /// Human readable title.
    pub title: String,
    /// Optional genre of the original sound.
    pub genre: Option<String>,
    /// Number of battles created around this sound.
    pub use_count: u64,
    /// Popularity signal in the 0..=100 range.
    pub viral_score: f64,
    /// Remixes generated from this sound.
    pub remixes: Vec<RemixEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Persisted battle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleStatusEntity {
    Selecting,
    PlayingP1,
    PlayingP2,
    Voting,
    Completed,
}

/// One player's remix choice inside a battle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemixSelectionEntity {
    /// Participant who chose.
    pub player_id: Uuid,
    /// Chosen remix of the battle's sound.
    pub remix_id: Uuid,
    /// Time of the latest choice.
    pub selected_at: SystemTime,
}

/// Aggregate battle entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleEntity {
    /// Primary key of the battle.
    pub id: Uuid,
    /// First participant.
    pub player1_id: Uuid,
    /// Second participant.
    pub player2_id: Uuid,
    /// Sound the battle is played on.
    pub sound_id: Uuid,
    /// Optional context tag chosen at creation.
    pub scene: Option<String>,
    /// Stored lifecycle status.
    pub status: BattleStatusEntity,
    /// At most one entry per participant, in selection order.
    pub remix_selections: Vec<RemixSelectionEntity>,
    /// Deadline of the current timed phase.
    pub playing_ends_at: Option<SystemTime>,
    /// Creation time; trending queries filter on it.
    pub created_at: SystemTime,
    /// Time of the last committed write.
    pub updated_at: SystemTime,
    /// Set when the battle completed.
    pub completed_at: Option<SystemTime>,
    /// Incremented on every committed write; conditional updates compare against it.
    pub version: u64,
}
