//! Listener registry for client notifications.
//!
//! Listeners are registered per event and invoked synchronously, in
//! registration order, every time the event is published. The same handle
//! may be registered more than once; `unsubscribe` removes every copy.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Events published by [`crate::PartClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    /// Authentication state changed or was re-confirmed. Payload is the new flag.
    Authenticated,
}

impl ClientEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback handle. Identity (not behaviour) is what `unsubscribe` matches on,
/// so keep the `Arc` you subscribed with.
pub type Listener<V = bool> = Arc<dyn Fn(V) + Send + Sync>;

/// Wrap a closure into a [`Listener`] handle.
pub fn listener<V, F>(f: F) -> Listener<V>
where
    F: Fn(V) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Event name → ordered listener list.
pub struct EventRegistry<E = ClientEvent, V = bool> {
    listeners: Mutex<HashMap<E, Vec<Listener<V>>>>,
}

impl<E, V> EventRegistry<E, V>
where
    E: Copy + Eq + Hash + fmt::Display,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Append `listener` to the event's list.
    pub fn subscribe(&self, event: E, listener: Listener<V>) {
        self.listeners.lock().entry(event).or_default().push(listener);
    }

    /// Remove every registration of `listener` for `event`. Unknown events or
    /// handles are ignored.
    pub fn unsubscribe(&self, event: E, listener: &Listener<V>) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(&event) {
            list.retain(|existing| !Arc::ptr_eq(existing, listener));
            if list.is_empty() {
                listeners.remove(&event);
            }
        }
    }

    /// Number of registrations currently held for `event`.
    pub fn listener_count(&self, event: E) -> usize {
        self.listeners.lock().get(&event).map_or(0, Vec::len)
    }

    /// Deliver `value` to every listener registered for `event` and return how
    /// many ran to completion.
    ///
    /// The list is snapshotted first, so listeners may subscribe or
    /// unsubscribe from inside a callback; changes apply to the next publish.
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn publish(&self, event: E, value: V) -> usize {
        let snapshot = match self.listeners.lock().get(&event) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (index, listener) in snapshot.iter().enumerate() {
            let value = value.clone();
            match catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(%event, index, "listener panicked; continuing delivery");
                }
            }
        }
        delivered
    }
}

impl<E, V> Default for EventRegistry<E, V>
where
    E: Copy + Eq + Hash + fmt::Display,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
