use std::sync::Arc;

use dashmap::DashMap;
use parley_core::{ChannelEvent, ChannelEventKind, SubscriptionId};
use tokio::sync::broadcast;

/// Callback registered for one event kind.
pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Typed publish/subscribe for channel events.
///
/// Callbacks run synchronously on the emitting task, in registration order.
/// Every event is also forwarded to a broadcast channel for stream consumers.
pub struct EventBus {
    handlers: DashMap<ChannelEventKind, Vec<(SubscriptionId, EventHandler)>>,
    tx: broadcast::Sender<ChannelEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            handlers: DashMap::new(),
            tx,
        }
    }

    pub fn subscribe<F>(&self, kind: ChannelEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers
            .entry(kind)
            .or_default()
            .push((id.clone(), Arc::new(handler)));
        id
    }

    /// Remove a subscription. Unknown ids are a no-op returning `false`.
    pub fn unsubscribe(&self, kind: ChannelEventKind, id: &SubscriptionId) -> bool {
        let Some(mut handlers) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| existing != id);
        before != handlers.len()
    }

    pub fn handler_count(&self, kind: ChannelEventKind) -> usize {
        self.handlers.get(&kind).map(|h| h.len()).unwrap_or(0)
    }

    pub fn receiver(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ChannelEvent) {
        // Snapshot so handlers may (un)subscribe without holding the shard lock.
        let handlers: Vec<EventHandler> = self
            .handlers
            .get(&event.kind())
            .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(&event);
        }
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_receive_only_their_kind() {
        let bus = EventBus::new(16);
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        bus.subscribe(ChannelEventKind::ConnectionOpened, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(ChannelEvent::ConnectionOpened);
        bus.emit(ChannelEvent::CameOnline);
        bus.emit(ChannelEvent::ConnectionOpened);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new(16);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            bus.subscribe(ChannelEventKind::CameOnline, move |_| order.lock().push(tag));
        }
        bus.emit(ChannelEvent::CameOnline);
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(16);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bus.subscribe(ChannelEventKind::CameOnline, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(bus.unsubscribe(ChannelEventKind::CameOnline, &id));
        assert!(!bus.unsubscribe(ChannelEventKind::CameOnline, &id));
        assert!(!bus.unsubscribe(ChannelEventKind::SocketError, &SubscriptionId::new()));
        bus.emit(ChannelEvent::CameOnline);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.handler_count(ChannelEventKind::CameOnline), 0);
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new(16));
        let slot: Arc<parking_lot::Mutex<Option<SubscriptionId>>> = Arc::default();
        let (bus_ref, slot_ref) = (Arc::clone(&bus), Arc::clone(&slot));
        let id = bus.subscribe(ChannelEventKind::CameOnline, move |_| {
            if let Some(id) = slot_ref.lock().take() {
                bus_ref.unsubscribe(ChannelEventKind::CameOnline, &id);
            }
        });
        *slot.lock() = Some(id);
        bus.emit(ChannelEvent::CameOnline);
        assert_eq!(bus.handler_count(ChannelEventKind::CameOnline), 0);
    }

    #[tokio::test]
    async fn events_reach_broadcast_receivers() {
        let bus = EventBus::new(16);
        let mut rx = bus.receiver();
        bus.emit(ChannelEvent::SocketError {
            message: "boom".into(),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            ChannelEvent::SocketError {
                message: "boom".into()
            }
        );
    }
}
