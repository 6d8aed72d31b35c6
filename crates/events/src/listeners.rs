//! In-process listener registry (observer pattern).
//!
//! A [`ListenerSet`] distributes values of type `A` to every registered
//! callback. It is the synchronous, callback-based counterpart of a pub/sub
//! bus:
//!
//! - **Registration order**: callbacks run in the order they were registered.
//! - **Snapshot fan-out**: `emit` copies the callback list and releases the
//!   lock before invoking anything, so callbacks may register or unregister
//!   listeners (including themselves) without deadlocking or invalidating the
//!   iteration.
//! - **Liveness check per call**: a listener unregistered before its turn in
//!   the current pass is not invoked; every other listener still is.
//!
//! ## Usage Pattern
//!
//! ```ignore
//! let set: ListenerSet<bool> = ListenerSet::new();
//! let sub = set.subscribe(|connected| println!("connected = {connected}"));
//! set.emit(true);
//! sub.unsubscribe(); // or just drop it
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

struct Entry<A> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<A>,
}

struct Inner<A> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<A>>>,
}

impl<A> Inner<A> {
    // A panicking listener must not take the whole registry down with it.
    fn entries(&self) -> MutexGuard<'_, Vec<Entry<A>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removal side of a listener registry, type-erased so that every
/// [`ListenerSet`] hands out the same [`Subscription`] type.
trait Unregister: Send + Sync {
    fn unregister(&self, id: u64);
}

impl<A> Unregister for Inner<A> {
    fn unregister(&self, id: u64) {
        self.entries().retain(|entry| entry.id != id);
    }
}

/// Registry of callbacks receiving values of type `A`.
///
/// Cheap to clone; clones share the same listeners.
pub struct ListenerSet<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for ListenerSet<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> Default for ListenerSet<A> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<A> ListenerSet<A> {
    /// Number of currently registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A> core::fmt::Debug for ListenerSet<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<A> ListenerSet<A>
where
    A: Clone + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.inner.entries().push(Entry {
            id,
            active: Arc::clone(&active),
            callback: Arc::new(callback),
        });

        let inner: Arc<dyn Unregister> = self.inner.clone();
        Subscription {
            id,
            active,
            owner: Some(Arc::downgrade(&inner)),
        }
    }

    /// Invoke every live callback once with `value`, in registration order.
    ///
    /// Returns the number of callbacks invoked.
    pub fn emit(&self, value: A) -> usize {
        let snapshot: Vec<(Arc<AtomicBool>, Callback<A>)> = self
            .inner
            .entries()
            .iter()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.callback)))
            .collect();

        let mut invoked = 0;
        for (active, callback) in snapshot {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            callback(value.clone());
            invoked += 1;
        }

        tracing::trace!(invoked, "listeners notified");
        invoked
    }

}

/// Handle to a registered callback.
///
/// Dropping the handle unregisters the callback; call [`Subscription::detach`]
/// to keep it registered for the lifetime of the registry instead.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    owner: Option<Weak<dyn Unregister>>,
}

impl Subscription {
    /// Unregister the callback. Safe to call from inside a notification pass.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Leave the callback registered for as long as its registry lives.
    pub fn detach(mut self) {
        self.owner = None;
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(owner) = self.owner.take() else {
            return;
        };
        self.active.store(false, Ordering::Release);
        if let Some(owner) = owner.upgrade() {
            owner.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn emit_reaches_every_listener_in_registration_order() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let subs: Vec<_> = (0..3)
            .map(|n| {
                let seen = Arc::clone(&seen);
                set.subscribe(move |v| seen.lock().unwrap().push((n, v)))
            })
            .collect();

        assert_eq!(set.emit(7), 3);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
        drop(subs);
    }

    #[test]
    fn debug_and_len_need_no_bounds_on_the_value_type() {
        // `Mutex` is not `Clone`, so `emit` is unavailable for this set.
        let set: ListenerSet<StdMutex<u8>> = ListenerSet::default();
        assert!(set.is_empty());
        assert_eq!(format!("{set:?}"), "ListenerSet { listeners: 0 }");

        let counted: ListenerSet<u8> = ListenerSet::new();
        let _sub = counted.subscribe(|_| {});
        assert_eq!(format!("{counted:?}"), "ListenerSet { listeners: 1 }");
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let set: ListenerSet<()> = ListenerSet::new();
        let sub = set.subscribe(|_| {});
        assert_eq!(set.len(), 1);

        sub.unsubscribe();
        assert!(set.is_empty());
        assert_eq!(set.emit(()), 0);
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let set: ListenerSet<()> = ListenerSet::new();
        set.subscribe(|_| {}).detach();
        assert_eq!(set.len(), 1);
        assert_eq!(set.emit(()), 1);
    }

    #[test]
    fn self_unsubscribe_during_emit_does_not_skip_next_listener() {
        let set: ListenerSet<()> = ListenerSet::new();
        let calls = Arc::new(StdMutex::new(Vec::new()));

        let first_slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let first = {
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&first_slot);
            set.subscribe(move |_| {
                calls.lock().unwrap().push("first");
                if let Some(sub) = slot.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            })
        };
        *first_slot.lock().unwrap() = Some(first);

        let second = {
            let calls = Arc::clone(&calls);
            set.subscribe(move |_| calls.lock().unwrap().push("second"))
        };

        assert_eq!(set.emit(()), 2);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(set.len(), 1);

        set.emit(());
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "second"]);
        drop(second);
    }

    #[test]
    fn listener_unregistered_before_its_turn_is_not_invoked() {
        let set: ListenerSet<()> = ListenerSet::new();
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let victim_slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));

        let killer = {
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&victim_slot);
            set.subscribe(move |_| {
                calls.lock().unwrap().push("killer");
                slot.lock().unwrap().take();
            })
        };
        let victim = {
            let calls = Arc::clone(&calls);
            set.subscribe(move |_| calls.lock().unwrap().push("victim"))
        };
        *victim_slot.lock().unwrap() = Some(victim);
        let last = {
            let calls = Arc::clone(&calls);
            set.subscribe(move |_| calls.lock().unwrap().push("last"))
        };

        assert_eq!(set.emit(()), 2);
        assert_eq!(*calls.lock().unwrap(), vec!["killer", "last"]);
        drop((killer, last));
    }

    #[test]
    fn subscription_outliving_set_drops_cleanly() {
        let set: ListenerSet<()> = ListenerSet::new();
        let sub = set.subscribe(|_| {});
        drop(set);
        assert!(sub.is_active());
        drop(sub);
    }
}
