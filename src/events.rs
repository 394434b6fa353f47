//! Observer bus for grouping and task change notifications
//!
//! Handlers registered with [`EventBus::subscribe`] run synchronously, in
//! subscription order. Every event is also pushed to a broadcast channel for
//! consumers that prefer an async stream.
//!
//! Events pass through an outbox: [`EventBus::queue`] fixes their order and
//! [`EventBus::deliver`] hands them out. Only one thread delivers at a time,
//! so batches queued by concurrent callers reach handlers whole and in queue
//! order, even when a handler is slow.

use crate::types::{GroupKey, TaskKey};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Buffer size of the broadcast stream
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Event emitted by a pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A grouping's membership or description changed
    Changed {
        /// Grouping that changed
        group: GroupKey,
    },

    /// A task joined a grouping
    TaskAdded {
        /// Grouping the task joined
        group: GroupKey,
        /// Task that joined
        task: TaskKey,
    },

    /// A task left a grouping
    TaskRemoved {
        /// Grouping the task left
        group: GroupKey,
        /// Task that left
        task: TaskKey,
    },

    /// A task's status or progress changed
    TaskChanged {
        /// Grouping the task is listed in after the change
        group: GroupKey,
        /// Task that changed
        task: TaskKey,
    },

    /// One-shot, user-facing notification
    Notification {
        /// Task the notification concerns, if any
        task: Option<TaskKey>,
        /// Short title (e.g. "Network Error")
        title: String,
        /// Message body, usually the engine's error text
        message: String,
    },
}

impl Event {
    /// The kind used for subscription filtering
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Changed { .. } => EventKind::Changed,
            Event::TaskAdded { .. } => EventKind::TaskAdded,
            Event::TaskRemoved { .. } => EventKind::TaskRemoved,
            Event::TaskChanged { .. } => EventKind::TaskChanged,
            Event::Notification { .. } => EventKind::Notification,
        }
    }
}

/// Event kinds a handler can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// [`Event::Changed`]
    Changed,
    /// [`Event::TaskAdded`]
    TaskAdded,
    /// [`Event::TaskRemoved`]
    TaskRemoved,
    /// [`Event::TaskChanged`]
    TaskChanged,
    /// [`Event::Notification`]
    Notification,
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous event handler
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Events waiting for delivery
#[derive(Default)]
struct Outbox {
    pending: VecDeque<Event>,
    /// Set while some thread is draining `pending`
    delivering: bool,
}

/// Clears `Outbox::delivering` when a handler panics mid-delivery
struct DeliveryGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).delivering = false;
        }
    }
}

/// Ordered, synchronous observer registry plus a broadcast stream
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    outbox: Mutex<Outbox>,
    tx: tokio::sync::broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            outbox: Mutex::new(Outbox::default()),
            tx,
        }
    }

    /// Register `handler` for events of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                kind,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove a handler; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Stream of every emitted event
    ///
    /// A receiver that falls more than 1000 events behind gets
    /// `RecvError::Lagged`.
    pub fn receiver(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Queue `event` and deliver everything pending
    pub fn emit(&self, event: Event) {
        self.emit_all([event]);
    }

    /// Queue a batch and deliver everything pending
    pub fn emit_all(&self, events: impl IntoIterator<Item = Event>) {
        self.queue(events);
        self.deliver();
    }

    /// Append a batch to the outbox without delivering it
    ///
    /// Callers that must order their batch against other writers' batches
    /// queue it while still holding the lock that serializes those writers,
    /// then call [`EventBus::deliver`] after releasing it.
    pub fn queue(&self, events: impl IntoIterator<Item = Event>) {
        self.lock_outbox().pending.extend(events);
    }

    /// Deliver pending events in queue order
    ///
    /// Returns at once if another thread is already delivering; that thread
    /// drains whatever was queued here before it stops.
    pub fn deliver(&self) {
        {
            let mut outbox = self.lock_outbox();
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }
        let _guard = DeliveryGuard(&self.outbox);

        loop {
            let next = self.lock_outbox().pending.pop_front();
            match next {
                Some(event) => self.dispatch(event),
                None => {
                    // Re-check and release under one lock so nothing queued in
                    // between is left behind
                    let mut outbox = self.lock_outbox();
                    if outbox.pending.is_empty() {
                        outbox.delivering = false;
                        return;
                    }
                }
            }
        }
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Call matching handlers, then feed the broadcast stream
    fn dispatch(&self, event: Event) {
        // Handlers may subscribe or unsubscribe while running, so they are
        // called on a snapshot taken outside the lock.
        let handlers: Vec<Handler> = {
            let subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let kind = event.kind();
            subscribers
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        for handler in handlers {
            handler(&event);
        }

        // No receivers is fine
        self.tx.send(event).ok();
    }
}
