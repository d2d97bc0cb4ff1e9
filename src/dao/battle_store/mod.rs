#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{collections::BTreeMap, time::SystemTime};

use crate::dao::models::{BattleEntity, PlayerEntity, SoundEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for players, sounds and battles.
///
/// Every call is atomic on its own. Battle updates are conditional on the stored
/// `version` so concurrent writers cannot silently overwrite each other.
pub trait BattleStore: Send + Sync {
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Set `last_active_at`, creating the player with an empty taste profile on first
    /// contact. Nothing else of an existing player is written.
    fn touch_player(&self, id: Uuid, now: SystemTime)
    -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    /// Replace the taste profile and set `last_active_at`, creating the player if needed.
    fn set_taste_profile(
        &self,
        id: Uuid,
        taste_profile: BTreeMap<String, f64>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    fn save_sound(&self, sound: SoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_sound(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SoundEntity>>>;
    fn list_sounds(&self) -> BoxFuture<'static, StorageResult<Vec<SoundEntity>>>;
    /// Bump the use count of a sound; `false` when the sound does not exist.
    fn increment_sound_use(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Insert a new battle; fails with a conflict when the id is already taken.
    fn create_battle(&self, battle: BattleEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>>;
    /// Replace the battle only if the stored version still equals `expected_version`.
    fn update_battle_if(
        &self,
        battle: BattleEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Battles created at or after `since`.
    fn list_battles_since(
        &self,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
