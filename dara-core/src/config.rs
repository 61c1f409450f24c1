//! Store configuration.

use serde::Deserialize;

/// Tunables for a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,

    /// Whether the store publishes [`DaraEvent`](crate::events::DaraEvent)s.
    pub emit_events: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            emit_events: true,
        }
    }
}
