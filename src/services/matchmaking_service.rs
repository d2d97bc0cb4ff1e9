use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{battle_store::BattleStore, storage::StorageError},
    dto::queue::{
        JoinQueueRequest, JoinQueueResponse, LeaveQueueRequest, LeaveQueueResponse, MatchView,
        QueueStatusResponse,
    },
    error::ServiceError,
    services::{
        battle_service::start_battle, player_service::touch_player,
        sound_service::pick_random_sound, sse_events::broadcast_queue_matched,
    },
    state::{
        MatchNotice, SharedState,
        battle::Battle,
        matchmaking::{LeaveOutcome, RemovedPair, ScoredCandidate, select_partner},
        similarity::{TasteProfile, clamp_similarity},
    },
};

/// Snapshot-to-removal rounds before an attempt gives up.
const MATCH_ROUNDS: usize = 2;

/// Outcome of a match attempt.
#[derive(Debug, Clone)]
pub enum MatchAttempt {
    /// Both players left the queue and a battle was created.
    Matched { battle: Battle, similarity: f64 },
    /// Nobody suitable, or the requester is no longer queued.
    NoMatch,
}

/// Join (or re-join) the queue and try to match right away.
pub async fn join_queue(
    state: &SharedState,
    request: JoinQueueRequest,
) -> Result<JoinQueueResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let player_id = request.player_id;
    touch_player(&store, player_id, SystemTime::now()).await?;

    state.clear_match(player_id);
    let ticket = {
        let mut queue = state.queue().lock().await;
        queue.join(player_id, request.mode.into(), SystemTime::now())
    };
    info!(%player_id, mode = ?request.mode, position = ticket.position, "player joined queue");

    let matched = match attempt_match(state, &store, player_id).await? {
        MatchAttempt::Matched { battle, .. } => Some(match_view(&battle, player_id)),
        MatchAttempt::NoMatch => None,
    };
    let position = match matched {
        Some(_) => None,
        None => state.queue().lock().await.position(player_id),
    };

    Ok(JoinQueueResponse {
        queue_id: ticket.queue_id,
        position,
        matched,
    })
}

/// Leave the queue. Never fails, even in degraded mode.
///
/// A player whose pair is being turned into a battle waits for the outcome: a created
/// battle wins and reports `left = false`, a failed one reports `left = true` without
/// queueing the player again.
pub async fn leave_queue(state: &SharedState, request: LeaveQueueRequest) -> LeaveQueueResponse {
    let player_id = request.player_id;
    let mut waited = false;
    loop {
        let resolved = state.pairing_resolved().notified();
        tokio::pin!(resolved);
        // Registered before the lock so a resolution right after it is not missed.
        resolved.as_mut().enable();

        let outcome = state.queue().lock().await.leave(player_id);
        let left = match outcome {
            LeaveOutcome::Removed => true,
            LeaveOutcome::Absent => waited && state.match_for(player_id).is_none(),
            LeaveOutcome::Pending => {
                debug!(%player_id, "leave waits for in-flight pairing");
                resolved.await;
                waited = true;
                continue;
            }
        };
        if left {
            info!(%player_id, "player left queue");
        }
        return LeaveQueueResponse { left };
    }
}

/// Report queue membership, attempting a match first when the player is queued.
pub async fn queue_status(
    state: &SharedState,
    player_id: Uuid,
) -> Result<QueueStatusResponse, ServiceError> {
    let queued = state.queue().lock().await.entry(player_id).is_some();
    if queued {
        let store = state.require_battle_store().await?;
        attempt_match(state, &store, player_id).await?;
    }

    let position = state.queue().lock().await.position(player_id);
    let matched = state.match_for(player_id).map(|notice| MatchView {
        battle_id: notice.battle_id,
        opponent_id: notice.opponent_id,
        sound_id: notice.sound_id,
    });

    Ok(QueueStatusResponse {
        queued: position.is_some(),
        position,
        matched,
    })
}

/// Try to pair `player_id` with someone already queued.
///
/// Candidates are scored outside the queue lock; the pair is then removed only if
/// both entries are unchanged. A lost race restarts the attempt once, a second one
/// reports no match.
pub async fn attempt_match(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    player_id: Uuid,
) -> Result<MatchAttempt, ServiceError> {
    for round in 0..MATCH_ROUNDS {
        let (requester, snapshot) = {
            let queue = state.queue().lock().await;
            let Some(requester) = queue.entry(player_id).cloned() else {
                return Ok(MatchAttempt::NoMatch);
            };
            (requester, queue.snapshot_excluding(player_id))
        };
        if snapshot.is_empty() {
            return Ok(MatchAttempt::NoMatch);
        }

        let Some(sound) = pick_random_sound(store).await? else {
            debug!(%player_id, "no sound available; leaving players queued");
            return Ok(MatchAttempt::NoMatch);
        };

        let requester_profile = load_profile(store, player_id).await?;
        let mut candidates = Vec::with_capacity(snapshot.len());
        for entry in snapshot {
            let profile = load_profile(store, entry.player_id).await?;
            let similarity =
                clamp_similarity(state.scorer().similarity(&requester_profile, &profile));
            candidates.push(ScoredCandidate { entry, similarity });
        }

        let Some(choice) =
            select_partner(requester.mode, &candidates, state.match_thresholds()).cloned()
        else {
            return Ok(MatchAttempt::NoMatch);
        };

        let removed = {
            let mut queue = state.queue().lock().await;
            queue.remove_pair(&requester, &choice.entry)
        };
        let pair = match removed {
            Ok(pair) => pair,
            Err(conflict) => {
                debug!(%player_id, round, error = %conflict, "queue changed during match attempt");
                continue;
            }
        };

        // Detached so a dropped request still settles or restores the pair.
        let pairing = tokio::spawn(complete_pairing(
            state.clone(),
            store.clone(),
            pair,
            sound.id,
            choice.similarity,
        ));
        return pairing.await.map_err(|err| {
            ServiceError::Unavailable(StorageError::unavailable(
                "pairing task failed".into(),
                err,
            ))
        })?;
    }

    Ok(MatchAttempt::NoMatch)
}

/// Create the battle for a removed pair, then settle the pair or put it back.
async fn complete_pairing(
    state: SharedState,
    store: Arc<dyn BattleStore>,
    pair: RemovedPair,
    sound_id: Uuid,
    similarity: f64,
) -> Result<MatchAttempt, ServiceError> {
    let player_id = pair.requester().player_id;
    let partner_id = pair.partner().player_id;
    match start_battle(&state, &store, player_id, partner_id, sound_id, None).await {
        Ok(battle) => {
            // Notices go first: a leave waiting on this pair reads them once woken.
            state.record_match(
                player_id,
                MatchNotice {
                    battle_id: battle.id,
                    opponent_id: partner_id,
                    sound_id: battle.sound_id,
                },
            );
            state.record_match(
                partner_id,
                MatchNotice {
                    battle_id: battle.id,
                    opponent_id: player_id,
                    sound_id: battle.sound_id,
                },
            );
            state.queue().lock().await.settle(&pair);
            state.pairing_resolved().notify_waiters();
            info!(
                battle_id = %battle.id,
                %player_id,
                %partner_id,
                similarity,
                "players matched"
            );
            broadcast_queue_matched(&state, &battle, similarity);
            Ok(MatchAttempt::Matched { battle, similarity })
        }
        Err(err) => {
            warn!(%player_id, %partner_id, error = %err, "battle creation failed; restoring queue entries");
            state.queue().lock().await.restore(pair);
            state.pairing_resolved().notify_waiters();
            Err(err)
        }
    }
}

async fn load_profile(
    store: &Arc<dyn BattleStore>,
    player_id: Uuid,
) -> Result<TasteProfile, ServiceError> {
    Ok(store
        .find_player(player_id)
        .await?
        .map(|player| player.taste_profile)
        .unwrap_or_default())
}

fn match_view(battle: &Battle, player_id: Uuid) -> MatchView {
    let opponent_id = if battle.player1_id == player_id {
        battle.player2_id
    } else {
        battle.player1_id
    };
    MatchView {
        battle_id: battle.id,
        opponent_id,
        sound_id: battle.sound_id,
    }
}
