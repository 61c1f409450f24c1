//! Identity hashing for variables.
//!
//! A variable's identity is its uid plus whatever parameterizes it: the
//! nested path for plain and derived variables, the filters for data kinds.
//! A parameterized identity is rendered as canonical JSON so logically equal
//! filters produce the same identifier and no uid or path segment can be
//! mistaken for a separator.
//!
//! Registry entries (selectors, triggers) belong to the base variable: a
//! nested view reads the same entries as the variable it is a view of.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::variable::AnyVariable;

/// Namespace of a registry entry sharing a variable's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKeyType {
    Selector,
    DerivedSelector,
    Trigger,
}

impl fmt::Display for RegistryKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistryKeyType::Selector => "selector",
            RegistryKeyType::DerivedSelector => "derived-selector",
            RegistryKeyType::Trigger => "trigger",
        })
    }
}

/// Stable identifier of a variable.
pub fn unique_identifier(variable: &AnyVariable) -> String {
    match variable {
        AnyVariable::Plain(v) => with_nested(&v.uid, &v.nested),
        AnyVariable::Url(v) => v.uid.clone(),
        AnyVariable::Data(v) => with_filters(&v.uid, v.filters.as_ref()),
        AnyVariable::Derived(v) => with_nested(&v.uid, &v.nested),
        AnyVariable::DerivedData(v) => with_filters(&v.uid, v.filters.as_ref()),
    }
}

/// Identifier of the variable a nested view reads from.
///
/// Same as [`unique_identifier`] with the nested path dropped.
pub fn base_identifier(variable: &AnyVariable) -> String {
    match variable {
        AnyVariable::Plain(v) => v.uid.clone(),
        AnyVariable::Derived(v) => v.uid.clone(),
        other => unique_identifier(other),
    }
}

/// Key of the registry entry of type `entry_type` for `variable`.
///
/// Keyed by [`base_identifier`], so nested views share their base's entries.
pub fn registry_key(variable: &AnyVariable, entry_type: RegistryKeyType) -> String {
    format!("{}-{}", base_identifier(variable), entry_type)
}

/// Render `value` as JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn with_nested(uid: &str, nested: &[String]) -> String {
    if nested.is_empty() {
        uid.to_string()
    } else {
        canonical_json(&json!({ "uid": uid, "nested": nested }))
    }
}

fn with_filters(uid: &str, filters: Option<&Value>) -> String {
    match filters {
        None | Some(Value::Null) => uid.to_string(),
        Some(filters) => canonical_json(&json!({ "uid": uid, "filters": filters })),
    }
}
