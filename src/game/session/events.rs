//! Session change feed
//!
//! Every successful mutation of a session is announced as one
//! [`SessionEvent`]. Subscribers register a handler with
//! [`EventBus::subscribe`] and keep the returned [`Subscription`] alive for as
//! long as they want events.
//!
//! # Unsubscribing
//!
//! Dropping the [`Subscription`] (or calling [`Subscription::unsubscribe`])
//! removes the handler. Publishing iterates over a snapshot of the subscriber
//! list, so a handler may drop its own subscription while it is running; it
//! will not be called again, and neither will any handler removed earlier in
//! the same round.

use crate::game::session::command::CommandKind;
use crate::game::session::lifecycle::Lifecycle;
use crate::game::types::SessionId;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Command(CommandKind),
    /// Lifecycle event routed through the manager; carries the new state
    Lifecycle(Lifecycle),
    /// Always the last event for a session id
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub kind: ChangeKind,
}

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

/// Publish/subscribe list owned by the session manager
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it stays registered while the returned
    /// [`Subscription`] lives
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner.subscribers.lock().push(Arc::new(Subscriber {
            id,
            active: active.clone(),
            handler: Arc::new(handler),
        }));

        Subscription {
            id,
            active,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber
    pub fn publish(&self, event: &SessionEvent) {
        self.publish_while(event, || true);
    }

    /// Deliver `event`, stopping as soon as `still_valid` turns false
    ///
    /// The session manager uses this to stop a command event mid-round when a
    /// handler destroys the session it refers to.
    pub fn publish_while(&self, event: &SessionEvent, still_valid: impl Fn() -> bool) {
        let snapshot: Vec<Arc<Subscriber>> = self.inner.subscribers.lock().clone();
        for subscriber in snapshot {
            if !still_valid() {
                break;
            }
            if subscriber.active.load(Ordering::Acquire) {
                (subscriber.handler)(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

/// Handle keeping a handler registered
///
/// Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler now
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.lock().retain(|s| s.id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
