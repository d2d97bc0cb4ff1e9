use std::{sync::Arc, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{battle_store::BattleStore, models::BattleEntity},
    dto::battle::{
        AdvanceBattleRequest, BattleView, CreateBattleRequest, RemixSelectionView,
        SelectRemixRequest, SelectRemixResponse,
    },
    error::ServiceError,
    services::{
        player_service::touch_player,
        sound_service::find_sound,
        sse_events::{broadcast_battle_created, broadcast_remix_selected, broadcast_state_changed},
    },
    state::{
        SharedState,
        battle::{Battle, SelectionRejected},
        lifecycle::BattleStatus,
        transitions::{commit_battle, commit_with_broadcast, load_settled, with_battle_gate},
    },
};

/// Create a battle directly from two player ids and a sound.
pub async fn create_battle(
    state: &SharedState,
    request: CreateBattleRequest,
) -> Result<BattleView, ServiceError> {
    let store = state.require_battle_store().await?;
    let battle = start_battle(
        state,
        &store,
        request.player1_id,
        request.player2_id,
        request.sound_id,
        request.scene,
    )
    .await?;
    Ok(BattleView::from(&battle))
}

/// Persist a new battle in the selection phase and announce it.
///
/// Players are created on first contact. The sound's use count is bumped on a
/// best-effort basis.
pub async fn start_battle(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    player1_id: Uuid,
    player2_id: Uuid,
    sound_id: Uuid,
    scene: Option<String>,
) -> Result<Battle, ServiceError> {
    if player1_id == player2_id {
        return Err(ServiceError::InvalidInput(
            "a battle needs two different players".into(),
        ));
    }

    let now = SystemTime::now();
    find_sound(store, sound_id).await?;
    touch_player(store, player1_id, now).await?;
    touch_player(store, player2_id, now).await?;

    let battle = Battle::new(player1_id, player2_id, sound_id, scene, now);
    store.create_battle(BattleEntity::from(battle.clone())).await?;

    match store.increment_sound_use(sound_id).await {
        Ok(true) => {}
        Ok(false) => warn!(%sound_id, "sound vanished before its use count was bumped"),
        Err(err) => warn!(%sound_id, error = %err, "failed to bump sound use count"),
    }

    info!(battle_id = %battle.id, %player1_id, %player2_id, %sound_id, "battle created");
    broadcast_battle_created(state, &battle);
    Ok(battle)
}

/// Read a battle, settling any phase deadline that already passed.
pub async fn get_battle(state: &SharedState, battle_id: Uuid) -> Result<BattleView, ServiceError> {
    let store = state.require_battle_store().await?;
    let battle = with_battle_gate(state, battle_id, || {
        load_settled(state, &store, battle_id, SystemTime::now())
    })
    .await?;
    Ok(BattleView::from(&battle))
}

/// Record (or replace) a participant's remix pick.
///
/// The pick that completes the pair also starts the first round, and both are
/// written together.
pub async fn select_remix(
    state: &SharedState,
    battle_id: Uuid,
    request: SelectRemixRequest,
) -> Result<SelectRemixResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    with_battle_gate(state, battle_id, || {
        select_remix_locked(state, &store, battle_id, request)
    })
    .await
}

async fn select_remix_locked(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    battle_id: Uuid,
    request: SelectRemixRequest,
) -> Result<SelectRemixResponse, ServiceError> {
    let SelectRemixRequest {
        player_id,
        remix_id,
    } = request;
    let now = SystemTime::now();
    let mut battle = load_settled(state, store, battle_id, now).await?;

    if !battle.is_participant(player_id) {
        return Err(not_participant(battle_id, player_id));
    }
    if battle.status.is_terminal() {
        return Ok(SelectRemixResponse {
            selection: battle.selection_of(player_id).map(RemixSelectionView::from),
            both_selected: battle.both_selected(),
            status: battle.status.into(),
            battle: BattleView::from(&battle),
        });
    }
    if battle.status != BattleStatus::Selecting {
        return Err(wrong_phase(battle.status, "remix selection"));
    }

    let sound = find_sound(store, battle.sound_id).await?;
    if !sound.remixes.iter().any(|remix| remix.id == remix_id) {
        return Err(ServiceError::NotFound(format!(
            "remix `{remix_id}` for sound `{}`",
            sound.id
        )));
    }

    let outcome = battle
        .record_selection(state.phase_plan(), player_id, remix_id, now)
        .map_err(|rejected| match rejected {
            SelectionRejected::NotParticipant => not_participant(battle_id, player_id),
            SelectionRejected::WrongPhase(status) => wrong_phase(status, "remix selection"),
        })?;

    touch_player(store, player_id, now).await?;
    let committed = commit_battle(store, battle, now).await?;

    broadcast_remix_selected(
        state,
        battle_id,
        player_id,
        remix_id,
        outcome.both_selected,
    );
    if let Some(transition) = outcome.transition.as_ref() {
        info!(%battle_id, to = ?transition.to, "both remixes selected");
        broadcast_state_changed(state, battle_id, transition);
    }

    Ok(SelectRemixResponse {
        selection: Some(RemixSelectionView::from(&outcome.selection)),
        both_selected: outcome.both_selected,
        status: committed.status.into(),
        battle: BattleView::from(&committed),
    })
}

/// End the current timed phase on behalf of a participant.
pub async fn advance_battle(
    state: &SharedState,
    battle_id: Uuid,
    request: AdvanceBattleRequest,
) -> Result<BattleView, ServiceError> {
    let store = state.require_battle_store().await?;
    with_battle_gate(state, battle_id, || {
        advance_locked(state, &store, battle_id, request.player_id)
    })
    .await
}

async fn advance_locked(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    battle_id: Uuid,
    player_id: Uuid,
) -> Result<BattleView, ServiceError> {
    let now = SystemTime::now();
    let mut battle = load_settled(state, store, battle_id, now).await?;

    if !battle.is_participant(player_id) {
        return Err(not_participant(battle_id, player_id));
    }

    let Some(transition) = battle.advance(state.phase_plan(), now)? else {
        return Ok(BattleView::from(&battle));
    };
    touch_player(store, player_id, now).await?;
    let committed = commit_with_broadcast(state, store, battle, &[transition], now).await?;
    info!(%battle_id, to = ?transition.to, "battle advanced");
    Ok(BattleView::from(&committed))
}

fn not_participant(battle_id: Uuid, player_id: Uuid) -> ServiceError {
    ServiceError::InvalidParticipant(format!(
        "player `{player_id}` is not part of battle `{battle_id}`"
    ))
}

fn wrong_phase(status: BattleStatus, operation: &str) -> ServiceError {
    ServiceError::WrongPhase(format!("{operation} is not allowed while {status:?}"))
}
