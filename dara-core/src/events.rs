//! Global events published by the runtime.
//!
//! Events go out on a `tokio` broadcast channel. Publishing never blocks and
//! is not an error when nobody is listening.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use crate::variable::{DerivedVariable, PlainVariable};

/// An event, serialized as `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DaraEvent {
    /// A server-rendered component resolved.
    ServerComponentLoaded { name: String, uid: String, value: Value },

    /// A derived variable produced a fresh value.
    DerivedVariableLoaded { variable: DerivedVariable, value: Value },

    /// A plain variable got its first handle.
    PlainVariableLoaded { variable: PlainVariable, value: Value },
}

/// Broadcast channel for [`DaraEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DaraEvent>,
    enabled: bool,
}

impl EventBus {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, enabled }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaraEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DaraEvent) {
        if !self.enabled {
            return;
        }
        if self.tx.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}
