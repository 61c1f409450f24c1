//! Reactive Primitives
//!
//! This module implements the reactive state layer the variable store sits
//! on: atoms, selectors and their parameterized families.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An Atom is a container for mutable state with a declared default. When an
//! atom is read within a tracking context (a selector being computed), the
//! atom registers that context as a dependent. Writing the atom notifies all
//! dependents.
//!
//! ## Selectors
//!
//! A Selector is a derived value that caches its result. It re-evaluates only
//! after one of its dependencies changed, and only when read again.
//!
//! ## Families
//!
//! A family turns a parameter into a member atom or selector, creating each
//! member once and caching it under the parameter's serialized key.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: a thread-local context stack records
//! which computation is running, and every read inside it subscribes that
//! computation.

mod atom;
mod context;
mod family;
mod selector;
mod subscriber;

pub use atom::Atom;
pub use context::ReactiveContext;
pub use family::{AtomFamily, FamilyParam, SelectorFamily};
pub use selector::{Selector, SelectorState};
pub use subscriber::{Notify, Subscriber, SubscriberId};
