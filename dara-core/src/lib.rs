//! Dara Core
//!
//! This crate provides the client-side interactivity runtime of the Dara
//! framework. It implements:
//!
//! - Reactive primitives (atoms, selectors, atom and selector families)
//! - The variable store: lazily created, cached handles per variable
//! - The trigger protocol for forcing derived variables to recompute
//! - Action handlers that reset or trigger variables
//! - Server-driven component and action registries
//!
//! # Architecture
//!
//! - `reactive`: atoms, selectors, families and dependency tracking
//! - `variable`: the variable kinds and their identity hashing (`hashing`)
//! - `store`: the registry of handles and derived computation
//! - `actions`: action definitions and handlers
//! - `registry`: component/action manifests with on-demand lookup
//! - `events`, `history`, `config`: collaborators and tunables
//!
//! # Example
//!
//! ```rust,ignore
//! use dara_core::{AnyVariable, PlainVariable, RequestExtras, Store};
//!
//! let store = Store::new(resolver);
//! let count = PlainVariable { uid: "count".into(), default: json!(0), nested: vec![] };
//!
//! // First access registers the variable
//! let atom = store.get_or_register_plain_variable(&count, &RequestExtras::default());
//! atom.set(json!(5));
//!
//! // Later accesses return the same handle
//! let same = store.get_atom(&AnyVariable::from(count), &RequestExtras::default())?;
//! assert_eq!(same.get(), json!(5));
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod events;
pub mod hashing;
pub mod history;
pub mod reactive;
pub mod registry;
pub mod store;
pub mod variable;

pub use actions::{dispatch, reset_variables, ActionContext, ActionImpl};
pub use config::StoreConfig;
pub use error::{ActionError, RegistryError, ResolveError, Result};
pub use events::{DaraEvent, EventBus};
pub use hashing::{base_identifier, registry_key, unique_identifier, RegistryKeyType};
pub use history::{MemoryHistory, UrlHistory};
pub use store::{DerivedResolver, Resolved, Store};
pub use variable::{
    AnyVariable, DataVariable, DependencyCacheEntry, DerivedDataVariable, DerivedVariable,
    PlainVariable, RequestExtras, TriggerIndexValue, UrlVariable, VariableKind,
};
