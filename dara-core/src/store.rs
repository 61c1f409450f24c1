//! Variable Store
//!
//! The store maps variables to the reactive handles that hold their values.
//! Handles are created lazily the first time a variable is referenced and
//! are cached for the store's lifetime; a handle, once registered, is never
//! replaced.
//!
//! # Tables
//!
//! | table               | key                       | handle                              |
//! |---------------------|---------------------------|-------------------------------------|
//! | `atoms`             | uid                       | URL and data variable atoms         |
//! | `atom_families`     | uid                       | plain variable atom families        |
//! | `selectors`         | `<base>-selector`         | derived data variable selectors     |
//! | `selector_families` | `<base>-derived-selector` | derived variable selector families  |
//! | `triggers`          | `<base>-trigger`          | trigger atoms                       |
//! | `deps`              | selector key + extras     | last inputs/output of a computation |
//!
//! Plain and derived variables are family-backed: each distinct
//! [`RequestExtras`] yields its own member handle under one family entry.
//! A variable with a `nested` path is a view: it shares the handles of its
//! base variable and picks the path out of the value after reading it.
//!
//! # Derived values
//!
//! A derived selector resolves its input variables, reads its trigger and
//! builds a cache key from the inputs listed in `deps`, the triggers of the
//! data variables among them and its own trigger's `inc`. An unchanged key
//! returns the previous result without calling the resolver. A set `force`
//! flag always recomputes and is cleared afterwards.
//!
//! # Ownership
//!
//! `Store` is a cheap handle around shared tables. Selector computations hold
//! a weak reference back to the tables, so dropping every `Store` clone frees
//! them.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use smallvec::SmallVec;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::error::{RegistryError, ResolveError, Result};
use crate::events::{DaraEvent, EventBus};
use crate::hashing::{canonical_json, registry_key, unique_identifier, RegistryKeyType};
use crate::history::{MemoryHistory, UrlHistory};
use crate::reactive::{Atom, AtomFamily, Selector, SelectorFamily};
use crate::variable::{
    resolve_nested, AnyVariable, DataVariable, DependencyCacheEntry, DerivedDataVariable,
    DerivedVariable, PlainVariable, RequestExtras, TriggerIndexValue, UrlVariable,
};

/// Outcome of resolving a variable.
pub type Resolved = std::result::Result<Value, ResolveError>;

/// Computes derived values from their resolved inputs.
///
/// This is the seam to whatever actually evaluates derived variables,
/// typically a request to the server.
pub trait DerivedResolver: Send + Sync {
    fn resolve(&self, variable: &DerivedVariable, args: &[Value], extras: &RequestExtras) -> Resolved;

    fn resolve_data(
        &self,
        variable: &DerivedDataVariable,
        args: &[Value],
        extras: &RequestExtras,
    ) -> Resolved;
}

struct Registries {
    atoms: DashMap<String, Atom<Value>>,
    atom_families: DashMap<String, AtomFamily<RequestExtras, Value>>,
    selectors: DashMap<String, Selector<Resolved>>,
    selector_families: DashMap<String, SelectorFamily<RequestExtras, Resolved>>,
    triggers: DashMap<String, Atom<TriggerIndexValue>>,
    deps: DashMap<String, DependencyCacheEntry>,
    resolver: Arc<dyn DerivedResolver>,
    history: Arc<dyn UrlHistory>,
    events: EventBus,
}

/// Process-scoped registry of variable handles.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Registries>,
}

impl Store {
    /// Create a store with default configuration and an in-memory URL.
    pub fn new(resolver: Arc<dyn DerivedResolver>) -> Self {
        Self::with_config(StoreConfig::default(), resolver, Arc::new(MemoryHistory::new()))
    }

    pub fn with_config(
        config: StoreConfig,
        resolver: Arc<dyn DerivedResolver>,
        history: Arc<dyn UrlHistory>,
    ) -> Self {
        Self {
            inner: Arc::new(Registries {
                atoms: DashMap::new(),
                atom_families: DashMap::new(),
                selectors: DashMap::new(),
                selector_families: DashMap::new(),
                triggers: DashMap::new(),
                deps: DashMap::new(),
                resolver,
                history,
                events: EventBus::new(config.event_capacity, config.emit_events),
            }),
        }
    }

    fn from_weak(weak: &Weak<Registries>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Subscribe to events published by this store.
    pub fn subscribe(&self) -> broadcast::Receiver<DaraEvent> {
        self.inner.events.subscribe()
    }

    /// The event bus, for collaborators that publish their own events.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// The URL collaborator.
    pub fn history(&self) -> &dyn UrlHistory {
        self.inner.history.as_ref()
    }

    /// Key of the registry entry of type `entry_type` for `variable`.
    pub fn registry_key(&self, variable: &AnyVariable, entry_type: RegistryKeyType) -> String {
        registry_key(variable, entry_type)
    }

    /// Whether `variable` has a handle in this store.
    ///
    /// Family-backed kinds count as registered once at least one member
    /// exists.
    pub fn is_registered(&self, variable: &AnyVariable) -> bool {
        match variable {
            AnyVariable::Plain(v) => self
                .inner
                .atom_families
                .get(&v.uid)
                .is_some_and(|family| !family.is_empty()),
            AnyVariable::Url(v) => self.inner.atoms.contains_key(&v.uid),
            AnyVariable::Data(v) => self.inner.atoms.contains_key(&v.uid),
            AnyVariable::Derived(_) => self
                .inner
                .selector_families
                .get(&registry_key(variable, RegistryKeyType::DerivedSelector))
                .is_some_and(|family| !family.is_empty()),
            AnyVariable::DerivedData(_) => self
                .inner
                .selectors
                .contains_key(&registry_key(variable, RegistryKeyType::Selector)),
        }
    }

    /// [`is_registered`](Self::is_registered) for raw JSON; anything that is
    /// not a variable is unregistered.
    pub fn is_registered_value(&self, value: &Value) -> bool {
        AnyVariable::from_value(value).is_some_and(|v| self.is_registered(&v))
    }

    /// The directly writable atom of a plain or URL variable.
    ///
    /// Plain variables resolve to the family member for `extras`.
    pub fn get_atom(&self, variable: &AnyVariable, extras: &RequestExtras) -> Result<Atom<Value>> {
        if !self.is_registered(variable) {
            warn!(uid = variable.uid(), "variable is not registered");
            return Err(RegistryError::NotRegistered {
                uid: variable.uid().to_string(),
            });
        }

        let not_registered = || RegistryError::NotRegistered {
            uid: variable.uid().to_string(),
        };

        match variable {
            AnyVariable::Plain(v) => self
                .inner
                .atom_families
                .get(&v.uid)
                .and_then(|family| family.existing(extras))
                .ok_or_else(not_registered),
            AnyVariable::Url(v) => self
                .inner
                .atoms
                .get(&v.uid)
                .map(|atom| atom.value().clone())
                .ok_or_else(not_registered),
            other => {
                warn!(uid = other.uid(), kind = %other.kind(), "variable has no atom");
                Err(RegistryError::NoAtom {
                    uid: other.uid().to_string(),
                    kind: other.kind(),
                })
            }
        }
    }

    pub fn get_or_register_plain_variable(
        &self,
        variable: &PlainVariable,
        extras: &RequestExtras,
    ) -> Atom<Value> {
        let family = self
            .inner
            .atom_families
            .entry(variable.uid.clone())
            .or_insert_with(|| {
                debug!(uid = %variable.uid, "registering plain variable family");
                let default = variable.default.clone();
                AtomFamily::new(move |_: &RequestExtras| default.clone())
            })
            .value()
            .clone();

        let (atom, created) = family.member_entry(extras);
        if created {
            self.inner.events.emit(DaraEvent::PlainVariableLoaded {
                variable: variable.clone(),
                value: atom.get_untracked(),
            });
        }
        atom
    }

    /// Register a URL variable, seeding it from the current query string.
    pub fn get_or_register_url_variable(&self, variable: &UrlVariable) -> Atom<Value> {
        self.inner
            .atoms
            .entry(variable.uid.clone())
            .or_insert_with(|| {
                let initial = self
                    .inner
                    .history
                    .query_param(&variable.query)
                    .map(|raw| parse_query_value(&raw))
                    .unwrap_or_else(|| variable.default.clone());
                debug!(uid = %variable.uid, query = %variable.query, "registering url variable");
                Atom::with_default(initial, variable.default.clone())
            })
            .value()
            .clone()
    }

    /// Set a URL variable and mirror the value into the query string.
    pub fn set_url_variable(&self, variable: &UrlVariable, value: Value) {
        let atom = self.get_or_register_url_variable(variable);
        let rendered = render_query_value(&value);
        atom.set(value);
        self.inner
            .history
            .set_query_param(&variable.query, rendered.as_deref());
    }

    pub fn get_or_register_data_variable(&self, variable: &DataVariable) -> Atom<Value> {
        self.inner
            .atoms
            .entry(variable.uid.clone())
            .or_insert_with(|| {
                debug!(uid = %variable.uid, "registering data variable");
                Atom::new(Value::Null)
            })
            .value()
            .clone()
    }

    /// The selector-family member computing `variable` for `extras`.
    ///
    /// The selector yields the whole value of the base variable; a `nested`
    /// path on `variable` is not applied here (see
    /// [`resolve_value`](Self::resolve_value)).
    pub fn get_or_register_derived_variable(
        &self,
        variable: &DerivedVariable,
        extras: &RequestExtras,
    ) -> Selector<Resolved> {
        let key = registry_key(
            &AnyVariable::Derived(variable.clone()),
            RegistryKeyType::DerivedSelector,
        );
        let family = self
            .inner
            .selector_families
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, "registering derived variable");
                let weak = Arc::downgrade(&self.inner);
                let base = DerivedVariable {
                    nested: Vec::new(),
                    ..variable.clone()
                };
                let key = key.clone();
                SelectorFamily::new(move |extras: &RequestExtras| match Store::from_weak(&weak) {
                    Some(store) => store.compute_derived(&base, &key, extras),
                    None => Err(ResolveError::new("store was dropped")),
                })
            })
            .value()
            .clone();

        family.member(extras)
    }

    /// The selector computing `variable`.
    ///
    /// Derived data variables are not family-backed: `extras` of the first
    /// registration are the ones the selector uses.
    pub fn get_or_register_derived_data_variable(
        &self,
        variable: &DerivedDataVariable,
        extras: &RequestExtras,
    ) -> Selector<Resolved> {
        let key = registry_key(
            &AnyVariable::DerivedData(variable.clone()),
            RegistryKeyType::Selector,
        );
        self.inner
            .selectors
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, "registering derived data variable");
                let weak = Arc::downgrade(&self.inner);
                let variable = variable.clone();
                let extras = extras.clone();
                Selector::new(move || match Store::from_weak(&weak) {
                    Some(store) => store.compute_derived_data(&variable, &key, &extras),
                    None => Err(ResolveError::new("store was dropped")),
                })
            })
            .value()
            .clone()
    }

    /// The trigger atom of `variable`, shared with its nested views.
    pub fn get_or_register_trigger(&self, variable: &AnyVariable) -> Atom<TriggerIndexValue> {
        let key = registry_key(variable, RegistryKeyType::Trigger);
        self.inner
            .triggers
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, "registering trigger");
                Atom::new(TriggerIndexValue::default())
            })
            .value()
            .clone()
    }

    /// Ask for `variable` to be recomputed.
    ///
    /// Bumps the trigger's `inc` by one and stores `force`. With `force` set
    /// the next computation ignores cached results. Triggering a data
    /// variable recomputes the derived variables that read it.
    pub fn trigger_variable(&self, variable: &AnyVariable, force: bool) -> Result<()> {
        match variable {
            AnyVariable::Derived(_) | AnyVariable::DerivedData(_) | AnyVariable::Data(_) => {
                let trigger = self.get_or_register_trigger(variable);
                trigger.update(|current| TriggerIndexValue {
                    force,
                    inc: current.inc + 1,
                });
                debug!(uid = variable.uid(), force, "triggered variable");
                Ok(())
            }
            other => Err(RegistryError::NotTriggerable {
                uid: other.uid().to_string(),
                kind: other.kind(),
            }),
        }
    }

    /// Read `variable` through its handle, registering it if needed.
    ///
    /// Inside a selector computation the read is tracked.
    pub fn resolve_value(&self, variable: &AnyVariable, extras: &RequestExtras) -> Resolved {
        match variable {
            AnyVariable::Plain(v) => {
                let value = self.get_or_register_plain_variable(v, extras).get();
                Ok(resolve_nested(value, &v.nested))
            }
            AnyVariable::Url(v) => Ok(self.get_or_register_url_variable(v).get()),
            AnyVariable::Data(v) => {
                self.get_or_register_trigger(variable).get();
                Ok(self.get_or_register_data_variable(v).get())
            }
            AnyVariable::Derived(v) => {
                let value = self.get_or_register_derived_variable(v, extras).get()?;
                Ok(resolve_nested(value, &v.nested))
            }
            AnyVariable::DerivedData(v) => {
                self.get_or_register_derived_data_variable(v, extras).get()
            }
        }
    }

    /// Cached inputs and output recorded under `key`.
    pub fn dependency_entry(&self, key: &str) -> Option<DependencyCacheEntry> {
        self.inner.deps.get(key).map(|entry| entry.value().clone())
    }

    /// Empty every table. For test isolation only.
    ///
    /// Handles obtained before the call keep working but are detached: the
    /// store hands out new handles for the same variables afterwards, and
    /// anything subscribed to the old ones stops hearing about changes made
    /// through the store.
    pub fn clear_registries_for_test(&self) {
        self.inner.atoms.clear();
        self.inner.atom_families.clear();
        self.inner.selectors.clear();
        self.inner.selector_families.clear();
        self.inner.triggers.clear();
        self.inner.deps.clear();
    }

    fn compute_derived(&self, variable: &DerivedVariable, key: &str, extras: &RequestExtras) -> Resolved {
        let any = AnyVariable::Derived(variable.clone());
        let deps_key = format!("{key}:{}", extras.cache_key());
        let computed = self.compute_cached(
            &any,
            &variable.variables,
            variable.deps.as_deref(),
            deps_key,
            extras,
            |args| self.inner.resolver.resolve(variable, args, extras),
        )?;

        if let Computed::Fresh(value) = &computed {
            self.inner.events.emit(DaraEvent::DerivedVariableLoaded {
                variable: variable.clone(),
                value: value.clone(),
            });
        }
        Ok(computed.into_value())
    }

    fn compute_derived_data(
        &self,
        variable: &DerivedDataVariable,
        key: &str,
        extras: &RequestExtras,
    ) -> Resolved {
        let any = AnyVariable::DerivedData(variable.clone());
        self.compute_cached(
            &any,
            &variable.variables,
            variable.deps.as_deref(),
            key.to_string(),
            extras,
            |args| self.inner.resolver.resolve_data(variable, args, extras),
        )
        .map(Computed::into_value)
    }

    fn compute_cached<F>(
        &self,
        variable: &AnyVariable,
        inputs: &[AnyVariable],
        deps: Option<&[AnyVariable]>,
        deps_key: String,
        extras: &RequestExtras,
        resolve: F,
    ) -> std::result::Result<Computed, ResolveError>
    where
        F: FnOnce(&[Value]) -> Resolved,
    {
        let args = inputs
            .iter()
            .map(|input| self.resolve_value(input, extras))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let positions = dependency_positions(inputs, deps);
        let mut incs: SmallVec<[u64; 4]> = positions
            .iter()
            .filter(|&&i| matches!(inputs[i], AnyVariable::Data(_)))
            .map(|&i| self.get_or_register_trigger(&inputs[i]).get_untracked().inc)
            .collect();

        let trigger = self.get_or_register_trigger(variable);
        let trigger_value = trigger.get();
        incs.push(trigger_value.inc);
        let cache_key = build_cache_key(&args, &positions, &incs);

        if !trigger_value.force {
            if let Some(entry) = self.inner.deps.get(&deps_key) {
                if entry.cache_key == cache_key {
                    trace!(key = %deps_key, "dependencies unchanged, reusing result");
                    return Ok(Computed::Cached(entry.result.clone()));
                }
            }
        }

        let result = resolve(&args)?;

        if trigger_value.force {
            trigger.replace_quiet(TriggerIndexValue {
                force: false,
                ..trigger_value
            });
        }

        self.inner.deps.insert(
            deps_key,
            DependencyCacheEntry {
                args,
                cache_key,
                result: result.clone(),
            },
        );
        Ok(Computed::Fresh(result))
    }
}

enum Computed {
    Fresh(Value),
    Cached(Value),
}

impl Computed {
    fn into_value(self) -> Value {
        match self {
            Computed::Fresh(value) | Computed::Cached(value) => value,
        }
    }
}

/// Positions of `inputs` that participate in the cache key.
fn dependency_positions(inputs: &[AnyVariable], deps: Option<&[AnyVariable]>) -> SmallVec<[usize; 8]> {
    match deps {
        None => (0..inputs.len()).collect(),
        Some(deps) => {
            let wanted: HashSet<String> = deps.iter().map(unique_identifier).collect();
            inputs
                .iter()
                .enumerate()
                .filter(|(_, input)| wanted.contains(&unique_identifier(input)))
                .map(|(i, _)| i)
                .collect()
        }
    }
}

/// Selected inputs as canonical JSON, then the trigger counters.
fn build_cache_key(args: &[Value], positions: &[usize], incs: &[u64]) -> String {
    let selected: Vec<Value> = positions
        .iter()
        .filter_map(|&i| args.get(i).cloned())
        .collect();
    let incs: Vec<String> = incs.iter().map(u64::to_string).collect();
    format!("{}:{}", canonical_json(&Value::Array(selected)), incs.join("."))
}

/// Query parameters hold JSON when they parse as JSON, raw strings otherwise.
fn parse_query_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn render_query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
