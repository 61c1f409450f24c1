//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! When an atom or selector is read inside a context, the running
//! computation is registered as one of its subscribers.
//!
//! # Implementation
//!
//! A thread-local stack holds the running computations. Entering a context
//! (e.g., recomputing a selector) pushes a subscriber onto the stack and the
//! returned guard pops it. Nested contexts cover selectors that read other
//! selectors.

use std::cell::RefCell;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The running computation.
    subscriber: Subscriber,
    /// IDs of the atoms and selectors read during this computation.
    dependencies: Vec<u64>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is exited when the returned guard is dropped.
    pub fn enter(subscriber: Subscriber) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the running subscriber, if any.
    pub fn current_subscriber() -> Option<Subscriber> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber.clone()))
    }

    /// Record a dependency on the given reactive value.
    pub fn track_dependency(source_id: u64) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.dependencies.push(source_id);
            }
        });
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Vec<u64> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber.id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.subscriber.id()
                );
            }
        });
    }
}
