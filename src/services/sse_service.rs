use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::{SharedState, StreamFilter, Subscription},
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> Subscription {
    state.sse().subscribe(StreamFilter::Public)
}

/// Subscribe to the events of one existing battle.
pub async fn subscribe_battle(
    state: &SharedState,
    battle_id: Uuid,
) -> Result<Subscription, ServiceError> {
    let store = state.require_battle_store().await?;
    // Subscribe before the lookup so nothing committed in between is missed.
    let subscription = state.sse().subscribe(StreamFilter::Battle(battle_id));
    if store.find_battle(battle_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("battle `{battle_id}`")));
    }
    Ok(subscription)
}

/// First event sent on a fresh stream.
pub fn handshake(state: &SharedState, filter: StreamFilter) -> ServerEvent {
    let (stream, message, battle_id) = match filter {
        StreamFilter::Public => ("public", "public stream connected".to_string(), None),
        StreamFilter::Battle(id) => ("battle", format!("battle {id} stream connected"), Some(id)),
    };
    let payload = Handshake {
        stream: stream.to_string(),
        message,
        degraded: state.is_degraded(),
        battle_id,
    };
    ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &payload).unwrap_or_else(|err| {
        warn!(error = %err, "failed to serialize SSE handshake");
        ServerEvent::new(Some(EVENT_HANDSHAKE.to_string()), String::new())
    })
}

/// Convert a subscription into an SSE response that sends `greeting` and then every
/// accepted event until the client disconnects.
pub fn to_sse_stream(
    mut subscription: Subscription,
    greeting: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(greeting))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = subscription.recv() => {
                    let Some(payload) = next else { break };
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        match subscription.filter() {
            StreamFilter::Public => info!("public SSE stream disconnected"),
            StreamFilter::Battle(battle_id) => {
                info!(%battle_id, "battle SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::battle_store::memory::MemoryBattleStore, state::AppState,
    };

    #[test]
    fn handshake_reports_degraded_flag() {
        let state = AppState::new(AppConfig::default());
        let battle_id = Uuid::new_v4();
        let event = handshake(&state, StreamFilter::Battle(battle_id));

        assert_eq!(event.event.as_deref(), Some(EVENT_HANDSHAKE));
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["stream"], "battle");
        assert_eq!(body["degraded"], true);
        assert_eq!(body["battle_id"], battle_id.to_string());
    }

    #[tokio::test]
    async fn battle_stream_skips_other_battles() {
        let state = AppState::new(AppConfig::default());
        let battle_id = Uuid::new_v4();
        let mut subscription = state.sse().subscribe(StreamFilter::Battle(battle_id));

        state
            .sse()
            .broadcast(ServerEvent::new(Some("other".into()), "{}".into()).for_battle(Uuid::new_v4()));
        state
            .sse()
            .broadcast(ServerEvent::new(Some("mine".into()), "{}".into()).for_battle(battle_id));

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn unknown_battle_stream_is_not_found() {
        let state = AppState::new(AppConfig::default());
        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;

        let err = subscribe_battle(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
