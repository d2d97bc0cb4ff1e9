//! Process-local storage backend kept in concurrent hash maps.

use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    battle_store::BattleStore,
    models::{BattleEntity, PlayerEntity, SoundEntity},
    storage::{StorageError, StorageResult},
};

/// In-memory [`BattleStore`]. Data does not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryBattleStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    players: DashMap<Uuid, PlayerEntity>,
    sounds: DashMap<Uuid, SoundEntity>,
    battles: DashMap<Uuid, BattleEntity>,
}

impl MemoryBattleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update a player in place under the shard lock, inserting it first if absent.
    fn upsert_player(
        &self,
        id: Uuid,
        now: SystemTime,
        taste_profile: Option<BTreeMap<String, f64>>,
    ) -> PlayerEntity {
        let mut player = self.inner.players.entry(id).or_insert_with(|| PlayerEntity {
            id,
            taste_profile: BTreeMap::new(),
            created_at: now,
            last_active_at: now,
        });
        player.last_active_at = now;
        if let Some(taste_profile) = taste_profile {
            player.taste_profile = taste_profile;
        }
        player.value().clone()
    }

    fn update_battle_if_sync(&self, battle: BattleEntity, expected_version: u64) -> StorageResult<()> {
        let id = battle.id;
        // The shard stays locked for the whole compare-and-replace.
        let Some(mut current) = self.inner.battles.get_mut(&id) else {
            return Err(StorageError::conflict("battle", id));
        };
        if current.version != expected_version {
            return Err(StorageError::conflict("battle", id));
        }
        *current = battle;
        Ok(())
    }
}

impl BattleStore for MemoryBattleStore {
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.players.insert(player.id, player);
        Box::pin(async { Ok(()) })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let player = self.inner.players.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(player) })
    }

    fn touch_player(
        &self,
        id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let player = self.upsert_player(id, now, None);
        Box::pin(async move { Ok(player) })
    }

    fn set_taste_profile(
        &self,
        id: Uuid,
        taste_profile: BTreeMap<String, f64>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let player = self.upsert_player(id, now, Some(taste_profile));
        Box::pin(async move { Ok(player) })
    }

    fn save_sound(&self, sound: SoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.sounds.insert(sound.id, sound);
        Box::pin(async { Ok(()) })
    }

    fn find_sound(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SoundEntity>>> {
        let sound = self.inner.sounds.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(sound) })
    }

    fn list_sounds(&self) -> BoxFuture<'static, StorageResult<Vec<SoundEntity>>> {
        let sounds = self
            .inner
            .sounds
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(async move { Ok(sounds) })
    }

    fn increment_sound_use(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let found = match self.inner.sounds.get_mut(&id) {
            Some(mut sound) => {
                sound.use_count += 1;
                true
            }
            None => false,
        };
        Box::pin(async move { Ok(found) })
    }

    fn create_battle(&self, battle: BattleEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = match self.inner.battles.entry(battle.id) {
            Entry::Occupied(_) => Err(StorageError::conflict("battle", battle.id)),
            Entry::Vacant(slot) => {
                slot.insert(battle);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>> {
        let battle = self.inner.battles.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(battle) })
    }

    fn update_battle_if(
        &self,
        battle: BattleEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update_battle_if_sync(battle, expected_version);
        Box::pin(async move { result })
    }

    fn list_battles_since(
        &self,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleEntity>>> {
        let battles = self
            .inner
            .battles
            .iter()
            .filter(|entry| entry.created_at >= since)
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(async move { Ok(battles) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::BattleStatusEntity;

    fn battle(version: u64) -> BattleEntity {
        let now = SystemTime::now();
        BattleEntity {
            id: Uuid::new_v4(),
            player1_id: Uuid::new_v4(),
            player2_id: Uuid::new_v4(),
            sound_id: Uuid::new_v4(),
            scene: None,
            status: BattleStatusEntity::Selecting,
            remix_selections: Vec::new(),
            playing_ends_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version,
        }
    }

    #[tokio::test]
    async fn conditional_update_rejects_stale_version() {
        let store = MemoryBattleStore::new();
        let original = battle(0);
        store.create_battle(original.clone()).await.unwrap();

        let mut first = original.clone();
        first.version = 1;
        first.status = BattleStatusEntity::PlayingP1;
        store.update_battle_if(first, 0).await.unwrap();

        let mut stale = original.clone();
        stale.version = 1;
        let err = store.update_battle_if(stale, 0).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = store.find_battle(original.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BattleStatusEntity::PlayingP1);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn create_battle_twice_conflicts() {
        let store = MemoryBattleStore::new();
        let entity = battle(0);
        store.create_battle(entity.clone()).await.unwrap();
        assert!(store.create_battle(entity).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn increment_unknown_sound_reports_missing() {
        let store = MemoryBattleStore::new();
        assert!(!store.increment_sound_use(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn touch_only_moves_last_active() {
        let store = MemoryBattleStore::new();
        let id = Uuid::new_v4();
        let start = SystemTime::UNIX_EPOCH;
        let later = start + std::time::Duration::from_secs(5);

        let created = store.touch_player(id, start).await.unwrap();
        assert!(created.taste_profile.is_empty());

        let taste = BTreeMap::from([("house".to_string(), 1.0)]);
        store.set_taste_profile(id, taste.clone(), start).await.unwrap();
        let touched = store.touch_player(id, later).await.unwrap();

        assert_eq!(touched.taste_profile, taste);
        assert_eq!(touched.created_at, start);
        assert_eq!(touched.last_active_at, later);
    }
}
