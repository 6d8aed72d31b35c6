//! Post-sync refresh notifications.
//!
//! Views that render server state (job list, "my applications") register a
//! cheap callback here, typically one that schedules a re-fetch. The sync
//! engine fires every callback once after each completed drain.

use staffsync_events::{ListenerSet, Subscription};

#[derive(Debug, Clone, Default)]
pub struct RefreshRegistry {
    listeners: ListenerSet<()>,
}

impl RefreshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a refresh callback. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped; both are safe to do from
    /// inside a callback.
    pub fn register<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(move |()| callback())
    }

    /// Invoke every registered callback once, in registration order.
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify_all(&self) -> usize {
        self.listeners.emit(())
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
