use std::{future::Future, sync::Arc, time::SystemTime};

use uuid::Uuid;

use crate::{
    dao::{battle_store::BattleStore, models::BattleEntity},
    error::ServiceError,
    services::sse_events::broadcast_state_changed,
    state::{SharedState, battle::Battle, lifecycle::Transition},
};

/// Run `work` while holding the battle's gate, then release the gate if idle.
pub async fn with_battle_gate<F, Fut, T>(state: &SharedState, battle_id: Uuid, work: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let gate = state.battle_gate(battle_id);
    let result = {
        let _guard = gate.lock().await;
        work().await
    };
    drop(gate);
    state.release_battle_gate(battle_id);
    result
}

/// Write `battle` back conditionally on the version it was read at.
///
/// Returns the committed battle carrying its new version. A concurrent writer
/// surfaces as [`ServiceError::Conflict`].
pub async fn commit_battle(
    store: &Arc<dyn BattleStore>,
    mut battle: Battle,
    now: SystemTime,
) -> Result<Battle, ServiceError> {
    let expected_version = battle.version;
    battle.version = expected_version + 1;
    battle.updated_at = now;
    store
        .update_battle_if(BattleEntity::from(battle.clone()), expected_version)
        .await?;
    Ok(battle)
}

/// Commit the battle, then broadcast one state change per applied transition.
///
/// Nothing is broadcast when the write loses, so each transition is announced once.
/// Reaching the terminal status drops the participants' match notices.
pub async fn commit_with_broadcast(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    battle: Battle,
    transitions: &[Transition],
    now: SystemTime,
) -> Result<Battle, ServiceError> {
    let committed = commit_battle(store, battle, now).await?;
    for transition in transitions {
        broadcast_state_changed(state, committed.id, transition);
    }
    if committed.status.is_terminal() {
        state.clear_battle_matches(
            committed.id,
            [committed.player1_id, committed.player2_id],
        );
    }
    Ok(committed)
}

/// Load a battle and settle any deadline that passed, persisting the result.
pub async fn load_settled(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    battle_id: Uuid,
    now: SystemTime,
) -> Result<Battle, ServiceError> {
    let entity = store
        .find_battle(battle_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("battle `{battle_id}`")))?;
    let mut battle = Battle::from(entity);

    let transitions = battle.settle_expired(state.phase_plan(), now);
    if transitions.is_empty() {
        return Ok(battle);
    }
    commit_with_broadcast(state, store, battle, &transitions, now).await
}
