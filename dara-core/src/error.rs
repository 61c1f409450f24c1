//! Error types.

use thiserror::Error;

use crate::variable::VariableKind;

/// Crate-wide result type.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Errors raised by the variable store and the server-driven registries.
///
/// The variable-store errors are usage-contract violations: they are not
/// transient and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A handle was requested before its variable was registered.
    #[error("Variable {uid} is not registered.")]
    NotRegistered { uid: String },

    /// The variable kind has no single directly writable atom.
    #[error("Variable {uid} of type {kind} does not have an associated atom.")]
    NoAtom { uid: String, kind: VariableKind },

    /// The variable kind cannot be force-recomputed.
    #[error("Variable {uid} of type {kind} cannot be triggered.")]
    NotTriggerable { uid: String, kind: VariableKind },

    /// A server-driven registry has no entry for `uid` and no lookup handler.
    #[error("Could not find uid {uid} in {registry} registry, did you register it before the app was initialized?")]
    UnknownEntry { registry: String, uid: String },

    /// A lookup handler failed to produce an entry.
    #[error("Lookup of {uid} in {registry} registry failed: {message}")]
    Lookup {
        registry: String,
        uid: String,
        message: String,
    },
}

/// Failure reported by a derived-value resolver.
///
/// Kept `Clone + PartialEq` so it can be cached inside a selector value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolveError {
    message: String,
}

impl ResolveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while running an action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("malformed action: {0}")]
    Malformed(#[from] serde_json::Error),
}
