use std::{sync::Arc, time::SystemTime};

use uuid::Uuid;

use crate::{
    dao::{battle_store::BattleStore, models::PlayerEntity},
    dto::player::{PlayerView, UpdateTasteRequest},
    error::ServiceError,
    state::SharedState,
};

/// Record an interaction, creating the player on first contact.
///
/// Only `last_active_at` is written, so a concurrent taste update is never lost.
pub async fn touch_player(
    store: &Arc<dyn BattleStore>,
    player_id: Uuid,
    now: SystemTime,
) -> Result<PlayerEntity, ServiceError> {
    Ok(store.touch_player(player_id, now).await?)
}

/// Return a known player.
pub async fn get_player(state: &SharedState, player_id: Uuid) -> Result<PlayerView, ServiceError> {
    let store = state.require_battle_store().await?;
    store
        .find_player(player_id)
        .await?
        .map(PlayerView::from)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}`")))
}

/// Replace the taste profile of a player, creating the player if needed.
pub async fn update_taste(
    state: &SharedState,
    player_id: Uuid,
    request: UpdateTasteRequest,
) -> Result<PlayerView, ServiceError> {
    let store = state.require_battle_store().await?;
    let player = store
        .set_taste_profile(player_id, request.taste_profile, SystemTime::now())
        .await?;
    Ok(player.into())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{config::AppConfig, dao::battle_store::memory::MemoryBattleStore, state::AppState};

    #[tokio::test]
    async fn taste_update_creates_player_on_first_contact() {
        let state = AppState::new(AppConfig::default());
        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;
        let player_id = Uuid::new_v4();

        assert!(matches!(
            get_player(&state, player_id).await,
            Err(ServiceError::NotFound(_))
        ));

        let request = UpdateTasteRequest {
            taste_profile: BTreeMap::from([("techno".to_string(), 0.9)]),
        };
        update_taste(&state, player_id, request).await.unwrap();

        let view = get_player(&state, player_id).await.unwrap();
        assert_eq!(view.taste_profile.get("techno"), Some(&0.9));
    }

    #[tokio::test]
    async fn touch_keeps_creation_time() {
        let store: Arc<dyn BattleStore> = Arc::new(MemoryBattleStore::new());
        let player_id = Uuid::new_v4();
        let first = SystemTime::UNIX_EPOCH;
        let later = first + std::time::Duration::from_secs(30);

        touch_player(&store, player_id, first).await.unwrap();
        let touched = touch_player(&store, player_id, later).await.unwrap();
        assert_eq!(touched.created_at, first);
        assert_eq!(touched.last_active_at, later);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn touches_do_not_overwrite_a_concurrent_taste_update() {
        let state = AppState::new(AppConfig::default());
        let store: Arc<dyn BattleStore> = Arc::new(MemoryBattleStore::new());
        state.install_battle_store(store.clone()).await;
        let player_id = Uuid::new_v4();
        touch_player(&store, player_id, SystemTime::now()).await.unwrap();

        let touches: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    touch_player(&store, player_id, SystemTime::now()).await.unwrap();
                })
            })
            .collect();
        let request = UpdateTasteRequest {
            taste_profile: BTreeMap::from([("house".to_string(), 0.8)]),
        };
        update_taste(&state, player_id, request).await.unwrap();
        for touch in touches {
            touch.await.unwrap();
        }

        let view = get_player(&state, player_id).await.unwrap();
        assert_eq!(view.taste_profile.get("house"), Some(&0.8));
    }

    #[tokio::test]
    async fn touch_after_taste_update_keeps_profile() {
        let store: Arc<dyn BattleStore> = Arc::new(MemoryBattleStore::new());
        let player_id = Uuid::new_v4();
        let profile = BTreeMap::from([("metal".to_string(), 1.0)]);

        store
            .set_taste_profile(player_id, profile.clone(), SystemTime::UNIX_EPOCH)
            .await
            .unwrap();
        let touched = touch_player(&store, player_id, SystemTime::now()).await.unwrap();
        assert_eq!(touched.taste_profile, profile);
        assert_eq!(touched.created_at, SystemTime::UNIX_EPOCH);
    }
}
