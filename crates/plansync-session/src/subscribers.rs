//! Session observers
//!
//! Callbacks registered on a session receive every [`SessionEvent`] after the
//! transition that produced it. Registration returns a [`Subscription`];
//! dropping it unregisters the callback.

use crate::error::SessionError;
use crate::machine::{ChangeKind, SyncState};
use parking_lot::Mutex;
use plansync_model::Fingerprint;
use std::sync::{Arc, Weak};

/// Notification delivered to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Sync state moved
    StateChanged { from: SyncState, to: SyncState },
    /// An external change awaits a reload or dismiss decision
    ConflictDetected { kind: ChangeKind },
    /// A save finished writing
    Saved {
        fingerprint: Fingerprint,
        plan: bool,
        layout: bool,
    },
    /// Disk contents were installed
    Reloaded {
        kind: ChangeKind,
        fingerprint: Fingerprint,
    },
    /// Background work failed
    Error(Arc<SessionError>),
}

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

/// Subscriber list
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Arc<Mutex<Registry>>,
}

impl Subscribers {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every callback
    ///
    /// Callbacks run outside the lock, so they may subscribe or unsubscribe.
    pub fn notify(&self, event: &SessionEvent) {
        let callbacks: Vec<Callback> = self
            .inner
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of registered callbacks
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    /// Whether no callback is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers").field("len", &self.len()).finish()
    }
}

/// Registration handle; unsubscribes on drop
#[derive(Debug)]
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(subs: &Subscribers) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = subs.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    fn event() -> SessionEvent {
        SessionEvent::ConflictDetected {
            kind: ChangeKind::Plan,
        }
    }

    #[test]
    fn every_subscriber_notified() {
        let subs = Subscribers::new();
        let (a, _sa) = counter(&subs);
        let (b, _sb) = counter(&subs);
        subs.notify(&event());
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let subs = Subscribers::new();
        let (a, sa) = counter(&subs);
        let (b, _sb) = counter(&subs);
        drop(sa);
        assert_eq!(subs.len(), 1);
        subs.notify(&event());
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_outliving_list_is_harmless() {
        let subs = Subscribers::new();
        let (_, sub) = counter(&subs);
        drop(subs);
        sub.unsubscribe();
    }

    #[test]
    fn callback_may_subscribe_reentrantly() {
        let subs = Subscribers::new();
        let inner = subs.clone();
        let held = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&held);
        let _sub = subs.subscribe(move |_| keep.lock().push(inner.subscribe(|_| {})));
        subs.notify(&event());
        assert_eq!(subs.len(), 2);
        held.lock().clear();
        assert_eq!(subs.len(), 1);
    }
}
