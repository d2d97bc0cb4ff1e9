use std::{sync::Arc, time::SystemTime};

use rand::seq::IndexedRandom;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        battle_store::BattleStore,
        models::{RemixEntity, SoundEntity},
    },
    dto::sound::{CreateSoundRequest, SoundView},
    error::ServiceError,
    state::SharedState,
};

/// Register a sound and its remixes.
pub async fn create_sound(
    state: &SharedState,
    request: CreateSoundRequest,
) -> Result<SoundView, ServiceError> {
    let store = state.require_battle_store().await?;
    let now = SystemTime::now();

    let CreateSoundRequest {
        title,
        genre,
        viral_score,
        remixes,
    } = request;

    if title.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "sound title must not be empty".into(),
        ));
    }

    let sound = SoundEntity {
        id: Uuid::new_v4(),
        title,
        genre,
        use_count: 0,
        viral_score,
        remixes: remixes
            .into_iter()
            .map(|remix| RemixEntity {
                id: Uuid::new_v4(),
                genre: remix.genre,
                url: remix.url,
                generated_at: now,
            })
            .collect(),
        created_at: now,
    };

    store.save_sound(sound.clone()).await?;
    info!(sound_id = %sound.id, remixes = sound.remixes.len(), "sound registered");
    Ok(sound.into())
}

/// Return one sound.
pub async fn get_sound(state: &SharedState, sound_id: Uuid) -> Result<SoundView, ServiceError> {
    let store = state.require_battle_store().await?;
    find_sound(&store, sound_id).await.map(SoundView::from)
}

/// Return the whole catalog, newest first.
pub async fn list_sounds(state: &SharedState) -> Result<Vec<SoundView>, ServiceError> {
    let store = state.require_battle_store().await?;
    let mut sounds = store.list_sounds().await?;
    sounds.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    Ok(sounds.into_iter().map(SoundView::from).collect())
}

/// Load a sound or fail with [`ServiceError::NotFound`].
pub async fn find_sound(
    store: &Arc<dyn BattleStore>,
    sound_id: Uuid,
) -> Result<SoundEntity, ServiceError> {
    store
        .find_sound(sound_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("sound `{sound_id}`")))
}

/// Pick a sound uniformly at random from the catalog.
pub async fn pick_random_sound(
    store: &Arc<dyn BattleStore>,
) -> Result<Option<SoundEntity>, ServiceError> {
    let sounds = store.list_sounds().await?;
    Ok(sounds.choose(&mut rand::rng()).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::battle_store::memory::MemoryBattleStore, dto::sound::RemixInput,
        state::AppState,
    };

    #[tokio::test]
    async fn created_sound_is_listed_with_remixes() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryBattleStore::new());
        state.install_battle_store(store.clone()).await;

        let created = create_sound(
            &state,
            CreateSoundRequest {
                title: "Glass".into(),
                genre: Some("ambient".into()),
                viral_score: 42.0,
                remixes: vec![RemixInput {
                    genre: "drill".into(),
                    url: "https://cdn.example.com/glass-drill.mp3".into(),
                }],
            },
        )
        .await
        .unwrap();

        let fetched = get_sound(&state, created.id).await.unwrap();
        assert_eq!(fetched.remixes.len(), 1);
        assert_eq!(list_sounds(&state).await.unwrap().len(), 1);

        let store: Arc<dyn BattleStore> = store;
        let picked = pick_random_sound(&store).await.unwrap().unwrap();
        assert_eq!(picked.id, created.id);
    }

    #[tokio::test]
    async fn empty_catalog_picks_nothing() {
        let store: Arc<dyn BattleStore> = Arc::new(MemoryBattleStore::new());
        assert!(pick_random_sound(&store).await.unwrap().is_none());
    }
}
