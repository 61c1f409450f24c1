//! Selector Implementation
//!
//! A Selector is a cached derived value that re-evaluates only when one of
//! the atoms or selectors it read last time changes.
//!
//! # How Selectors Work
//!
//! 1. On first access, the selector runs its computation inside a reactive
//!    context and caches the result. Every atom or selector read during the
//!    computation subscribes the selector's invalidator.
//!
//! 2. When a dependency changes, the invalidator marks the selector dirty and
//!    forwards the notification to the selector's own subscribers. Forwarding
//!    only happens on the clean-to-dirty edge, so a dirty selector absorbs
//!    repeated notifications.
//!
//! 3. The next access recomputes. Nothing is recomputed eagerly.
//!
//! # Thread Safety
//!
//! No lock is held while the computation runs, so a computation may read
//! other selectors freely. An epoch counter detects invalidations that race
//! with a running computation; such a result is returned but not marked
//! clean.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::atom::next_source_id;
use super::context::ReactiveContext;
use super::subscriber::{notify_all, Subscriber, SubscriberId};

/// Cache state of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// The cached value is up-to-date.
    Clean,

    /// The selector must recompute on next access.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// The PartialEq bound lets callers compare cached results cheaply.
pub struct Selector<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Unique identifier for this selector.
    id: u64,

    /// The subscriber ID used when this selector reads its dependencies.
    subscriber_id: SubscriberId,

    /// The computation function.
    compute: Arc<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: Arc<RwLock<Option<T>>>,

    /// Current cache state.
    state: Arc<RwLock<SelectorState>>,

    /// Bumped on every invalidation.
    epoch: Arc<AtomicU64>,

    /// IDs of the reactive values read during the last computation.
    dependencies: Arc<RwLock<HashSet<u64>>>,

    /// Subscribers notified when this selector becomes dirty.
    dependents: Arc<RwLock<Vec<Subscriber>>>,
}

impl<T> Selector<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new selector with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            id: next_source_id(),
            subscriber_id: SubscriberId::new(),
            compute: Arc::new(compute),
            value: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(SelectorState::Dirty)),
            epoch: Arc::new(AtomicU64::new(0)),
            dependencies: Arc::new(RwLock::new(HashSet::new())),
            dependents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the selector's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether two handles point at the same selector.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(self.id);
            self.add_dependent(subscriber);
        }

        if *self.state.read() == SelectorState::Clean {
            if let Some(value) = self.value.read().clone() {
                return value;
            }
        }

        self.recompute()
    }

    /// Mark the selector dirty so the next access recomputes.
    pub fn refresh(&self) {
        invalidate(&self.state, &self.epoch, &self.dependents);
    }

    /// Register a notification callback fired when the selector becomes dirty.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_dependent(Subscriber::with_id(subscriber_id, Arc::new(notify)));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.dependents.write().retain(|s| s.id() != subscriber_id);
    }

    /// Get the current cache state.
    pub fn state(&self) -> SelectorState {
        *self.state.read()
    }

    /// Check if the selector has a cached value.
    pub fn has_value(&self) -> bool {
        self.value.read().is_some()
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.dependents.read().len()
    }

    /// Get the number of reactive values read during the last computation.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.read().len()
    }

    fn add_dependent(&self, subscriber: Subscriber) {
        let mut dependents = self.dependents.write();
        if !dependents.iter().any(|s| s.id() == subscriber.id()) {
            dependents.push(subscriber);
        }
    }

    /// Build the callback handed to dependencies while computing.
    fn invalidator(&self) -> Subscriber {
        let state: Weak<RwLock<SelectorState>> = Arc::downgrade(&self.state);
        let epoch: Weak<AtomicU64> = Arc::downgrade(&self.epoch);
        let dependents: Weak<RwLock<Vec<Subscriber>>> = Arc::downgrade(&self.dependents);

        Subscriber::with_id(
            self.subscriber_id,
            Arc::new(move || {
                if let (Some(state), Some(epoch), Some(dependents)) =
                    (state.upgrade(), epoch.upgrade(), dependents.upgrade())
                {
                    invalidate(&state, &epoch, &dependents);
                }
            }),
        )
    }

    fn recompute(&self) -> T {
        let started_at = self.epoch.load(Ordering::SeqCst);

        let (new_value, new_deps) = {
            let _ctx = ReactiveContext::enter(self.invalidator());
            let value = (self.compute)();
            let deps: HashSet<u64> = ReactiveContext::get_dependencies().into_iter().collect();
            (value, deps)
        };

        *self.dependencies.write() = new_deps;
        *self.value.write() = Some(new_value.clone());

        if self.epoch.load(Ordering::SeqCst) == started_at {
            *self.state.write() = SelectorState::Clean;
        }

        new_value
    }
}

fn invalidate(
    state: &RwLock<SelectorState>,
    epoch: &AtomicU64,
    dependents: &RwLock<Vec<Subscriber>>,
) {
    epoch.fetch_add(1, Ordering::SeqCst);
    let was_clean = {
        let mut state = state.write();
        std::mem::replace(&mut *state, SelectorState::Dirty) == SelectorState::Clean
    };

    if was_clean {
        let snapshot = dependents.read().clone();
        notify_all(snapshot);
    }
}

impl<T> Clone for Selector<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            subscriber_id: self.subscriber_id,
            compute: Arc::clone(&self.compute),
            value: Arc::clone(&self.value),
            state: Arc::clone(&self.state),
            epoch: Arc::clone(&self.epoch),
            dependencies: Arc::clone(&self.dependencies),
            dependents: Arc::clone(&self.dependents),
        }
    }
}

impl<T> Debug for Selector<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}
