//! Process-wide notifications.
//!
//! Each event kind has its own [`Topic`]. Publishing calls every current
//! listener synchronously, once, in subscription order. Nothing is queued:
//! a listener that subscribes after a publish never sees that event, and an
//! event published with no listeners is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaChanged {
    pub persona_id: String,
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpened {
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelClosed {
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelErrored {
    pub channel_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewChanged {
    pub view: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelected {
    pub node_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Topic<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
}

impl<T> Default for Topic<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Topic<T> {
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver `event` to every current listener and return how many saw it.
    pub fn publish(&self, event: &T) -> usize {
        // Snapshot first so listeners may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener<T>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener<T>)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One topic per notification kind.
#[derive(Default)]
pub struct EventBus {
    pub persona_changed: Topic<PersonaChanged>,
    pub channel_opened: Topic<ChannelOpened>,
    pub channel_closed: Topic<ChannelClosed>,
    pub channel_errored: Topic<ChannelErrored>,
    /// Published and observed by presentation code only; the core never
    /// emits it.
    pub view_changed: Topic<ViewChanged>,
    /// Published and observed by presentation code only; the core never
    /// emits it.
    pub node_selected: Topic<NodeSelected>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }
}
