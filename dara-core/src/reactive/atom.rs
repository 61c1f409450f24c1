//! Atom Implementation
//!
//! An Atom is the mutable reactive primitive. It holds a value, remembers
//! the default it was declared with, and tracks which computations depend
//! on it.
//!
//! # How Atoms Work
//!
//! 1. When an atom is read within a reactive context (a selector being
//!    computed), the atom registers that context as a subscriber.
//!
//! 2. When the atom's value changes through `set`, `update` or `reset`,
//!    all subscribers are notified.
//!
//! 3. `replace_quiet` writes without notifying. It exists for consumers that
//!    own a flag inside the value (see the trigger protocol) and must clear
//!    it without scheduling another recomputation.
//!
//! # Thread Safety
//!
//! The value and the subscriber list sit behind `parking_lot` locks. No lock
//! is held while subscriber callbacks run.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::subscriber::{notify_all, Subscriber, SubscriberId};

/// Counter shared by atoms and selectors so dependency IDs never collide.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique reactive source ID.
pub(crate) fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A mutable reactive cell holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Atom::new(0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
///
/// count.reset();
/// assert_eq!(count.get(), 0);
/// ```
pub struct Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this atom.
    id: u64,

    /// The value `reset` restores.
    default: Arc<T>,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Subscribers notified on every write.
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl<T> Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new atom whose initial value is also its default.
    pub fn new(default: T) -> Self {
        Self::with_default(default.clone(), default)
    }

    /// Create a new atom starting at `value` that resets to `default`.
    pub fn with_default(value: T, default: T) -> Self {
        Self {
            id: next_source_id(),
            default: Arc::new(default),
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the atom's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether two handles point at the same atom.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the running
    /// computation as a subscriber.
    pub fn get(&self) -> T {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(self.id);
            self.add_subscriber(subscriber);
        }

        self.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// The declared default value.
    pub fn default_value(&self) -> T {
        (*self.default).clone()
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.notify_subscribers();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&*guard)
        };
        self.set(new_value);
    }

    /// Restore the declared default and notify subscribers.
    pub fn reset(&self) {
        self.set(self.default_value());
    }

    /// Write a value without notifying anyone.
    pub fn replace_quiet(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.write(), value)
    }

    /// Register a notification callback for a subscriber.
    ///
    /// The callback is invoked on every write.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_subscriber(Subscriber::with_id(subscriber_id, Arc::new(notify)));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id() != subscriber_id);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn add_subscriber(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.write();
        if !subscribers.iter().any(|s| s.id() == subscriber.id()) {
            subscribers.push(subscriber);
        }
    }

    fn notify_subscribers(&self) {
        let snapshot = self.subscribers.read().clone();
        notify_all(snapshot);
    }
}

impl<T> Clone for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Arc::clone(&self.default),
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Debug for Atom<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("default", &self.default)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
