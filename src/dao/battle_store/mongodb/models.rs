use std::collections::BTreeMap;

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    BattleEntity, BattleStatusEntity, PlayerEntity, RemixEntity, RemixSelectionEntity,
    SoundEntity,
};

// Identifiers are stored as hyphenated strings so filters and documents always agree.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    taste_profile: BTreeMap<String, f64>,
    created_at: DateTime,
    last_active_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            taste_profile: value.taste_profile,
            created_at: DateTime::from_system_time(value.created_at),
            last_active_at: DateTime::from_system_time(value.last_active_at),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            taste_profile: value.taste_profile,
            created_at: value.created_at.to_system_time(),
            last_active_at: value.last_active_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRemixDocument {
    id: String,
    genre: String,
    url: String,
    generated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSoundDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    genre: Option<String>,
    use_count: i64,
    viral_score: f64,
    remixes: Vec<MongoRemixDocument>,
    created_at: DateTime,
}

impl From<SoundEntity> for MongoSoundDocument {
    fn from(value: SoundEntity) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title,
            genre: value.genre,
            use_count: i64::try_from(value.use_count).unwrap_or(i64::MAX),
            viral_score: value.viral_score,
            remixes: value
                .remixes
                .into_iter()
                .map(|remix| MongoRemixDocument {
                    id: remix.id.to_string(),
                    genre: remix.genre,
                    url: remix.url,
                    generated_at: DateTime::from_system_time(remix.generated_at),
                })
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoSoundDocument> for SoundEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSoundDocument) -> MongoResult<Self> {
        let remixes = value
            .remixes
            .into_iter()
            .map(|remix| {
                Ok(RemixEntity {
                    id: parse_id(&remix.id)?,
                    genre: remix.genre,
                    url: remix.url,
                    generated_at: remix.generated_at.to_system_time(),
                })
            })
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(Self {
            id: parse_id(&value.id)?,
            title: value.title,
            genre: value.genre,
            use_count: u64::try_from(value.use_count).unwrap_or(0),
            viral_score: value.viral_score,
            remixes,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSelectionDocument {
    player_id: String,
    remix_id: String,
    selected_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBattleDocument {
    #[serde(rename = "_id")]
    id: String,
    player1_id: String,
    player2_id: String,
    sound_id: String,
    scene: Option<String>,
    status: BattleStatusEntity,
    remix_selections: Vec<MongoSelectionDocument>,
    playing_ends_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
    completed_at: Option<DateTime>,
    version: i64,
}

impl From<BattleEntity> for MongoBattleDocument {
    fn from(value: BattleEntity) -> Self {
        Self {
            id: value.id.to_string(),
            player1_id: value.player1_id.to_string(),
            player2_id: value.player2_id.to_string(),
            sound_id: value.sound_id.to_string(),
            scene: value.scene,
            status: value.status,
            remix_selections: value
                .remix_selections
                .into_iter()
                .map(|selection| MongoSelectionDocument {
                    player_id: selection.player_id.to_string(),
                    remix_id: selection.remix_id.to_string(),
                    selected_at: DateTime::from_system_time(selection.selected_at),
                })
                .collect(),
            playing_ends_at: value.playing_ends_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
            version: version_as_i64(value.version),
        }
    }
}

impl TryFrom<MongoBattleDocument> for BattleEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBattleDocument) -> MongoResult<Self> {
        let remix_selections = value
            .remix_selections
            .into_iter()
            .map(|selection| {
                Ok(RemixSelectionEntity {
                    player_id: parse_id(&selection.player_id)?,
                    remix_id: parse_id(&selection.remix_id)?,
                    selected_at: selection.selected_at.to_system_time(),
                })
            })
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(Self {
            id: parse_id(&value.id)?,
            player1_id: parse_id(&value.player1_id)?,
            player2_id: parse_id(&value.player2_id)?,
            sound_id: parse_id(&value.sound_id)?,
            scene: value.scene,
            status: value.status,
            remix_selections,
            playing_ends_at: value.playing_ends_at.map(|at| at.to_system_time()),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            completed_at: value.completed_at.map(|at| at.to_system_time()),
            version: u64::try_from(value.version).map_err(|_| {
                MongoDaoError::MalformedDocument {
                    id: value.id.clone(),
                    reason: "negative version",
                }
            })?,
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn version_as_i64(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn parse_id(raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| MongoDaoError::MalformedDocument {
        id: raw.to_string(),
        reason: "invalid UUID",
    })
}
