use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::debug;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Which events a subscription receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFilter {
    /// Every event.
    Public,
    /// Events about one battle, plus system-wide events.
    Battle(Uuid),
}

impl StreamFilter {
    fn accepts(&self, event: &ServerEvent) -> bool {
        match self {
            StreamFilter::Public => true,
            StreamFilter::Battle(id) => event.battle_id.is_none_or(|battle_id| battle_id == *id),
        }
    }
}

/// Fan-out of realtime events to public and per-battle subscribers.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a hub keeping at most `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a subscriber for the events `filter` accepts, starting from now.
    pub fn subscribe(&self, filter: StreamFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Publish an event. Returns how many subscribers were connected.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

/// Receiving end of [`SseHub::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ServerEvent>,
    filter: StreamFilter,
}

impl Subscription {
    /// Filter this subscription was opened with.
    pub fn filter(&self) -> StreamFilter {
        self.filter
    }

    /// Wait for the next accepted event. Events dropped because the subscriber lagged
    /// are skipped. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, filter = ?self.filter, "SSE subscriber lagged; skipping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next accepted event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.accepts(&event) => return Some(event),
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_for(battle_id: Option<Uuid>) -> ServerEvent {
        let event = ServerEvent::new(Some("test".into()), "{}".into());
        match battle_id {
            Some(id) => event.for_battle(id),
            None => event,
        }
    }

    #[test]
    fn battle_filter_keeps_own_and_system_events() {
        let mine = Uuid::new_v4();
        let filter = StreamFilter::Battle(mine);

        assert!(filter.accepts(&event_for(Some(mine))));
        assert!(filter.accepts(&event_for(None)));
        assert!(!filter.accepts(&event_for(Some(Uuid::new_v4()))));
        assert!(StreamFilter::Public.accepts(&event_for(Some(Uuid::new_v4()))));
    }

    #[tokio::test]
    async fn battle_subscription_only_sees_its_battle() {
        let hub = SseHub::new(16);
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut battle = hub.subscribe(StreamFilter::Battle(mine));
        let mut public = hub.subscribe(StreamFilter::Public);

        hub.broadcast(event_for(Some(other)));
        hub.broadcast(event_for(Some(mine)));
        hub.broadcast(event_for(None));

        assert_eq!(battle.recv().await.unwrap().battle_id, Some(mine));
        assert_eq!(battle.recv().await.unwrap().battle_id, None);
        assert!(battle.try_recv().is_none());

        let seen: Vec<_> = std::iter::from_fn(|| public.try_recv())
            .map(|event| event.battle_id)
            .collect();
        assert_eq!(seen, vec![Some(other), Some(mine), None]);
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_with_newest_events() {
        let hub = SseHub::new(2);
        let mut subscription = hub.subscribe(StreamFilter::Public);
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            hub.broadcast(event_for(Some(*id)));
        }

        assert_eq!(subscription.recv().await.unwrap().battle_id, Some(ids[2]));
        assert_eq!(subscription.recv().await.unwrap().battle_id, Some(ids[3]));
    }

    #[tokio::test]
    async fn subscription_ends_with_hub() {
        let hub = SseHub::new(4);
        let mut subscription = hub.subscribe(StreamFilter::Public);
        assert_eq!(hub.broadcast(event_for(None)), 1);
        drop(hub);

        assert!(subscription.recv().await.is_some());
        assert!(subscription.recv().await.is_none());
    }
}
