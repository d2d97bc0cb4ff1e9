use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const PLAYER_PREFIX: &str = "player::";
pub const SOUND_PREFIX: &str = "sound::";
pub const BATTLE_PREFIX: &str = "battle::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[allow(dead_code)]
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Envelope adding CouchDB's `_id`/`_rev` bookkeeping around an entity body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, rev: Option<String>, body: T) -> Self {
        Self { id, rev, body }
    }
}

pub fn player_doc_id(id: Uuid) -> String {
    format!("{}{}", PLAYER_PREFIX, id)
}

pub fn sound_doc_id(id: Uuid) -> String {
    format!("{}{}", SOUND_PREFIX, id)
}

pub fn battle_doc_id(id: Uuid) -> String {
    format!("{}{}", BATTLE_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, time::SystemTime};

    use super::*;
    use crate::dao::models::PlayerEntity;

    #[test]
    fn envelope_flattens_entity_fields() {
        let id = Uuid::new_v4();
        let player = PlayerEntity {
            id,
            taste_profile: BTreeMap::from([("house".to_string(), 0.8)]),
            created_at: SystemTime::UNIX_EPOCH,
            last_active_at: SystemTime::UNIX_EPOCH,
        };
        let document = CouchDocument::new(player_doc_id(id), None, player.clone());

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["_id"], format!("player::{id}"));
        assert!(value.get("_rev").is_none());
        assert!(value.get("taste_profile").is_some());

        let parsed: CouchDocument<PlayerEntity> = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.body, player);
    }
}
