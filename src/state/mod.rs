/// Battle aggregate and selection rules.
pub mod battle;
/// Statuses, events and the phase plan.
pub mod lifecycle;
/// Waiting queue and partner selection.
pub mod matchmaking;
/// Taste profile similarity.
pub mod similarity;
mod sse;
/// Gated, version-checked battle writes.
pub mod transitions;
/// Trending windows and ranking.
pub mod trending;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::battle_store::BattleStore,
    error::ServiceError,
    state::{
        lifecycle::PhasePlan,
        matchmaking::{MatchQueue, MatchThresholds},
        similarity::{CosineSimilarity, SimilarityScorer},
    },
};

pub use self::sse::{SseHub, StreamFilter, Subscription};

/// Handle shared by every request handler and background task.
pub type SharedState = Arc<AppState>;

/// Battle a player was paired into by a queue match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchNotice {
    /// Battle created for the pair.
    pub battle_id: Uuid,
    /// The other participant.
    pub opponent_id: Uuid,
    /// Sound the battle is played on.
    pub sound_id: Uuid,
}

/// Central application state storing the queue, battle gates and storage handle.
pub struct AppState {
    battle_store: RwLock<Option<Arc<dyn BattleStore>>>,
    sse: SseHub,
    degraded: watch::Sender<bool>,
    queue: Mutex<MatchQueue>,
    pairing_resolved: Notify,
    battle_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    matches: DashMap<Uuid, MatchNotice>,
    config: AppConfig,
    scorer: Arc<dyn SimilarityScorer>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_scorer(config, Arc::new(CosineSimilarity))
    }

    /// Same as [`AppState::new`] with a custom similarity scorer.
    pub fn with_scorer(config: AppConfig, scorer: Arc<dyn SimilarityScorer>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            battle_store: RwLock::new(None),
            sse: SseHub::new(config.sse_capacity),
            degraded: degraded_tx,
            queue: Mutex::new(MatchQueue::new()),
            pairing_resolved: Notify::new(),
            battle_gates: DashMap::new(),
            matches: DashMap::new(),
            config,
            scorer,
        })
    }

    /// Obtain a handle to the current battle store, if one is installed.
    pub async fn battle_store(&self) -> Option<Arc<dyn BattleStore>> {
        let guard = self.battle_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current battle store, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_battle_store(&self) -> Result<Arc<dyn BattleStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.battle_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new battle store implementation and leave degraded mode.
    pub async fn install_battle_store(&self, store: Arc<dyn BattleStore>) {
        {
            let mut guard = self.battle_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current battle store and enter degraded mode.
    pub async fn clear_battle_store(&self) {
        {
            let mut guard = self.battle_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Broadcast hub shared by every SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// The single matchmaking queue.
    pub fn queue(&self) -> &Mutex<MatchQueue> {
        &self.queue
    }

    /// Woken each time an in-flight pair is settled or restored.
    pub fn pairing_resolved(&self) -> &Notify {
        &self.pairing_resolved
    }

    /// Gate serializing writers of one battle. Unrelated battles never share a gate.
    pub fn battle_gate(&self, battle_id: Uuid) -> Arc<Mutex<()>> {
        self.battle_gates
            .entry(battle_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the gate of a battle once nobody else holds it.
    pub fn release_battle_gate(&self, battle_id: Uuid) {
        self.battle_gates
            .remove_if(&battle_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    /// Remember that `player_id` was paired, so their next status poll reports it.
    pub fn record_match(&self, player_id: Uuid, notice: MatchNotice) {
        self.matches.insert(player_id, notice);
    }

    /// Last match recorded for the player since they joined.
    pub fn match_for(&self, player_id: Uuid) -> Option<MatchNotice> {
        self.matches.get(&player_id).map(|entry| *entry)
    }

    /// Forget any match recorded for the player.
    pub fn clear_match(&self, player_id: Uuid) {
        self.matches.remove(&player_id);
    }

    /// Forget the notices pointing at `battle_id`. A player whose notice already moved on
    /// to a newer battle keeps it.
    pub fn clear_battle_matches(&self, battle_id: Uuid, players: [Uuid; 2]) {
        for player_id in players {
            self.matches
                .remove_if(&player_id, |_, notice| notice.battle_id == battle_id);
        }
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Timed phases every battle goes through.
    pub fn phase_plan(&self) -> &PhasePlan {
        &self.config.phase_plan
    }

    /// Similarity bounds used by the match modes.
    pub fn match_thresholds(&self) -> &MatchThresholds {
        &self.config.match_thresholds
    }

    /// Taste profile comparison used by matchmaking.
    pub fn scorer(&self) -> &dyn SimilarityScorer {
        self.scorer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::battle_store::memory::MemoryBattleStore;

    #[tokio::test]
    async fn store_install_toggles_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_battle_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_battle_store().await.is_ok());

        state.clear_battle_store().await;
        assert!(state.is_degraded());
    }

    #[test]
    fn released_gate_is_recreated() {
        let state = AppState::new(AppConfig::default());
        let id = Uuid::new_v4();

        let gate = state.battle_gate(id);
        state.release_battle_gate(id);
        assert!(Arc::ptr_eq(&gate, &state.battle_gate(id)));

        drop(gate);
        state.release_battle_gate(id);
        assert_eq!(state.battle_gates.len(), 0);
    }
}
