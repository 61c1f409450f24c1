//! Subscriber types for the reactive system.
//!
//! A Subscriber represents anything that wants to hear about changes to a
//! reactive value: a selector that read an atom while computing, or a view
//! that subscribed explicitly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. The ID is used to avoid
/// registering the same subscriber twice on one atom or selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared notification callback.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// A subscriber to reactive values.
///
/// Cloning a subscriber shares its callback.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Notify,
}

impl Subscriber {
    /// Create a new subscriber with a fresh ID.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_id(SubscriberId::new(), Arc::new(notify))
    }

    /// Create a subscriber for an existing ID.
    pub fn with_id(id: SubscriberId, notify: Notify) -> Self {
        Self { id, notify }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Notify the subscriber that one of its dependencies changed.
    pub fn notify(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Notify every subscriber in `subscribers`.
///
/// Callers pass a snapshot so no lock is held while callbacks run.
pub(crate) fn notify_all(subscribers: Vec<Subscriber>) {
    for subscriber in subscribers {
        subscriber.notify();
    }
}
