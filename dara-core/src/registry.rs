//! Server-driven registries.
//!
//! Components and actions are described by a manifest the server sends at
//! startup. A [`Registry`] holds those definitions by uid. Entries that were
//! not part of the manifest can be fetched on demand through a
//! [`RegistryLookup`] handler installed for that registry's name.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::events::{DaraEvent, EventBus};

/// Where a component is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Js,
    Py,
}

/// A component definition from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub js_module: Option<String>,
    #[serde(default)]
    pub py_module: Option<String>,
}

/// An action definition from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    #[serde(default)]
    pub js_module: Option<String>,
    #[serde(default)]
    pub py_module: Option<String>,
}

/// A named uid-to-definition table.
#[derive(Debug)]
pub struct Registry<T> {
    name: String,
    entries: DashMap<String, T>,
}

impl<T: Clone> Registry<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register(&self, uid: impl Into<String>, entry: T) {
        self.entries.insert(uid.into(), entry);
    }

    pub fn get(&self, uid: &str) -> Result<T> {
        self.entries
            .get(uid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::UnknownEntry {
                registry: self.name.clone(),
                uid: uid.to_string(),
            })
    }

    pub fn has(&self, uid: &str) -> bool {
        self.entries.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Future returned by a lookup handler.
pub type LookupFuture<T> = BoxFuture<'static, std::result::Result<T, String>>;

/// Fetches a missing entry by uid.
pub type LookupHandler<T> = Arc<dyn Fn(String) -> LookupFuture<T> + Send + Sync>;

/// Registry access with on-demand fallback handlers, keyed by registry name.
pub struct RegistryLookup<T> {
    handlers: HashMap<String, LookupHandler<T>>,
}

impl<T: Clone> RegistryLookup<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with_handler<F>(mut self, registry: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String) -> LookupFuture<T> + Send + Sync + 'static,
    {
        self.handlers.insert(registry.into(), Arc::new(handler));
        self
    }

    /// Get `uid` from `registry`, falling back to the registry's handler.
    ///
    /// A successful fallback registers the entry so later lookups hit the
    /// table directly.
    pub async fn get(&self, registry: &Registry<T>, uid: &str) -> Result<T> {
        if let Ok(entry) = registry.get(uid) {
            return Ok(entry);
        }

        let Some(handler) = self.handlers.get(registry.name()) else {
            return registry.get(uid);
        };

        debug!(registry = registry.name(), uid, "fetching missing registry entry");
        let entry = handler(uid.to_string())
            .await
            .map_err(|message| RegistryError::Lookup {
                registry: registry.name().to_string(),
                uid: uid.to_string(),
                message,
            })?;
        registry.register(uid, entry.clone());
        Ok(entry)
    }
}

impl<T: Clone> Default for RegistryLookup<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The component and action registries of one application.
#[derive(Debug)]
pub struct Registries {
    pub components: Registry<ComponentDef>,
    pub actions: Registry<ActionDef>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            components: Registry::new("components"),
            actions: Registry::new("actions"),
        }
    }

    /// Resolve component `uid` and announce it on `events`.
    pub async fn load_component(
        &self,
        lookup: &RegistryLookup<ComponentDef>,
        uid: &str,
        events: &EventBus,
    ) -> Result<ComponentDef> {
        let component = lookup.get(&self.components, uid).await?;
        events.emit(DaraEvent::ServerComponentLoaded {
            name: component.name.clone(),
            uid: uid.to_string(),
            value: serde_json::to_value(&component).unwrap_or_default(),
        });
        Ok(component)
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
