use std::time::SystemTime;

use tracing::debug;

use crate::{
    dto::sound::{DEFAULT_TRENDING_LIMIT, TrendingQuery, TrendingResponse, TrendingSoundView},
    error::ServiceError,
    state::{
        SharedState,
        trending::{TrendPeriod, rank_trending},
    },
};

/// Rank sounds by the battles created inside the requested window.
pub async fn trending(
    state: &SharedState,
    query: TrendingQuery,
) -> Result<TrendingResponse, ServiceError> {
    let period = match query.period.as_deref() {
        Some(raw) => raw
            .parse::<TrendPeriod>()
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?,
        None => TrendPeriod::default(),
    };
    let limit = query.limit.unwrap_or(DEFAULT_TRENDING_LIMIT);

    let store = state.require_battle_store().await?;
    let since = SystemTime::now()
        .checked_sub(period.duration())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let sounds = store.list_sounds().await?;
    let battles = store.list_battles_since(since).await?;
    debug!(%period, sounds = sounds.len(), battles = battles.len(), "ranking trending sounds");

    let ranked = rank_trending(sounds, battles.into_iter().map(|battle| battle.sound_id), limit);
    Ok(TrendingResponse {
        period: period.to_string(),
        sounds: ranked.into_iter().map(TrendingSoundView::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            battle_store::{BattleStore, memory::MemoryBattleStore},
            models::{BattleEntity, SoundEntity},
        },
        state::{AppState, battle::Battle},
    };

    async fn seed_sound(store: &Arc<dyn BattleStore>, viral_score: f64) -> Uuid {
        let id = Uuid::new_v4();
        store
            .save_sound(SoundEntity {
                id,
                title: format!("sound {viral_score}"),
                genre: None,
                use_count: 0,
                viral_score,
                remixes: Vec::new(),
                created_at: SystemTime::now(),
            })
            .await
            .unwrap();
        id
    }

    async fn seed_battle(store: &Arc<dyn BattleStore>, sound_id: Uuid, age: Duration) {
        let created = SystemTime::now() - age;
        let battle = Battle::new(Uuid::new_v4(), Uuid::new_v4(), sound_id, None, created);
        store
            .create_battle(BattleEntity::from(battle))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ranks_by_recent_battles_within_period() {
        let state = AppState::new(AppConfig::default());
        let store: Arc<dyn BattleStore> = Arc::new(MemoryBattleStore::new());
        state.install_battle_store(store.clone()).await;

        let a = seed_sound(&store, 80.0).await;
        let b = seed_sound(&store, 50.0).await;
        let quiet = seed_sound(&store, 100.0).await;
        for _ in 0..3 {
            seed_battle(&store, a, Duration::from_secs(60)).await;
        }
        for _ in 0..5 {
            seed_battle(&store, b, Duration::from_secs(60)).await;
        }
        seed_battle(&store, quiet, Duration::from_secs(3 * 86_400)).await;

        let response = trending(
            &state,
            TrendingQuery {
                limit: Some(1),
                period: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(response.period, "24h");
        assert_eq!(response.sounds.len(), 1);
        assert_eq!(response.sounds[0].sound_id, b);
        assert_eq!(response.sounds[0].trending_score, 7.5);

        let weekly = trending(
            &state,
            TrendingQuery {
                limit: None,
                period: Some("7d".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(weekly.sounds.len(), 3);
    }

    #[tokio::test]
    async fn unknown_period_is_invalid_input() {
        let state = AppState::new(AppConfig::default());
        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;

        let err = trending(
            &state,
            TrendingQuery {
                limit: None,
                period: Some("2w".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
