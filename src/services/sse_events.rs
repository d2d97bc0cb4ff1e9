use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        battle::BattleView,
        format_system_time,
        sse::{
            BattleCreatedEvent, QueueMatchedEvent, RemixSelectedEvent, ServerEvent,
            StateChangedEvent, SystemStatus,
        },
    },
    state::{SharedState, battle::Battle, lifecycle::Transition},
};

const EVENT_REMIX_SELECTED: &str = "battle.remix_selected";
const EVENT_STATE_CHANGED: &str = "battle.state_changed";
const EVENT_BATTLE_CREATED: &str = "battle.created";
const EVENT_QUEUE_MATCHED: &str = "queue.matched";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast that a participant picked a remix.
pub fn broadcast_remix_selected(
    state: &SharedState,
    battle_id: Uuid,
    player_id: Uuid,
    remix_id: Uuid,
    both_selected: bool,
) {
    let payload = RemixSelectedEvent {
        battle_id,
        player_id,
        remix_id,
        both_selected,
    };
    send_battle_event(state, battle_id, EVENT_REMIX_SELECTED, &payload);
}

/// Broadcast a committed status change.
pub fn broadcast_state_changed(state: &SharedState, battle_id: Uuid, transition: &Transition) {
    let payload = StateChangedEvent {
        battle_id,
        previous_status: transition.from.into(),
        new_status: transition.to.into(),
        playing_ends_at: transition.playing_ends_at.map(format_system_time),
    };
    send_battle_event(state, battle_id, EVENT_STATE_CHANGED, &payload);
}

/// Broadcast a freshly created battle.
pub fn broadcast_battle_created(state: &SharedState, battle: &Battle) {
    let payload = BattleCreatedEvent(BattleView::from(battle));
    send_battle_event(state, battle.id, EVENT_BATTLE_CREATED, &payload);
}

/// Broadcast that the queue paired two players.
pub fn broadcast_queue_matched(state: &SharedState, battle: &Battle, similarity: f64) {
    let payload = QueueMatchedEvent {
        battle_id: battle.id,
        player1_id: battle.player1_id,
        player2_id: battle.player2_id,
        sound_id: battle.sound_id,
        similarity,
    };
    send_battle_event(state, battle.id, EVENT_QUEUE_MATCHED, &payload);
}

/// Broadcast the degraded flag.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    match ServerEvent::json(Some(EVENT_SYSTEM_STATUS.to_string()), &payload) {
        Ok(event) => {
            let receivers = state.sse().broadcast(event);
            debug!(event = EVENT_SYSTEM_STATUS, degraded, receivers, "SSE event published");
        }
        Err(err) => warn!(
            event = EVENT_SYSTEM_STATUS,
            error = %err,
            "failed to serialize SSE payload"
        ),
    }
}

fn send_battle_event(
    state: &SharedState,
    battle_id: Uuid,
    event: &str,
    payload: &impl Serialize,
) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(server_event) => {
            let receivers = state.sse().broadcast(server_event.for_battle(battle_id));
            debug!(event, %battle_id, receivers, "SSE event published");
        }
        Err(err) => warn!(event, %battle_id, error = %err, "failed to serialize SSE payload"),
    }
}
