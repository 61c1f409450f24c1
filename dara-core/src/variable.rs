//! Variable definitions.
//!
//! Variables arrive from the server as JSON objects tagged by `__typename`.
//! [`AnyVariable`] is the closed set of kinds the store knows how to handle.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reactive::FamilyParam;

/// A client-side variable of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum AnyVariable {
    #[serde(rename = "Variable")]
    Plain(PlainVariable),
    #[serde(rename = "UrlVariable")]
    Url(UrlVariable),
    #[serde(rename = "DataVariable")]
    Data(DataVariable),
    #[serde(rename = "DerivedVariable")]
    Derived(DerivedVariable),
    #[serde(rename = "DerivedDataVariable")]
    DerivedData(DerivedDataVariable),
}

impl AnyVariable {
    /// Parse a JSON value, returning `None` for anything that is not a
    /// recognized variable shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.get("__typename").is_some_and(Value::is_string) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn uid(&self) -> &str {
        match self {
            AnyVariable::Plain(v) => &v.uid,
            AnyVariable::Url(v) => &v.uid,
            AnyVariable::Data(v) => &v.uid,
            AnyVariable::Derived(v) => &v.uid,
            AnyVariable::DerivedData(v) => &v.uid,
        }
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            AnyVariable::Plain(_) => VariableKind::Plain,
            AnyVariable::Url(_) => VariableKind::Url,
            AnyVariable::Data(_) => VariableKind::Data,
            AnyVariable::Derived(_) => VariableKind::Derived,
            AnyVariable::DerivedData(_) => VariableKind::DerivedData,
        }
    }
}

impl From<PlainVariable> for AnyVariable {
    fn from(v: PlainVariable) -> Self {
        AnyVariable::Plain(v)
    }
}

impl From<UrlVariable> for AnyVariable {
    fn from(v: UrlVariable) -> Self {
        AnyVariable::Url(v)
    }
}

impl From<DataVariable> for AnyVariable {
    fn from(v: DataVariable) -> Self {
        AnyVariable::Data(v)
    }
}

impl From<DerivedVariable> for AnyVariable {
    fn from(v: DerivedVariable) -> Self {
        AnyVariable::Derived(v)
    }
}

impl From<DerivedDataVariable> for AnyVariable {
    fn from(v: DerivedDataVariable) -> Self {
        AnyVariable::DerivedData(v)
    }
}

/// Kind tag of a variable, as spelled in `__typename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Plain,
    Url,
    Data,
    Derived,
    DerivedData,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableKind::Plain => "Variable",
            VariableKind::Url => "UrlVariable",
            VariableKind::Data => "DataVariable",
            VariableKind::Derived => "DerivedVariable",
            VariableKind::DerivedData => "DerivedDataVariable",
        };
        f.write_str(name)
    }
}

/// A client-side value with a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainVariable {
    pub uid: String,
    #[serde(default)]
    pub default: Value,
    /// Path into the value this variable exposes.
    #[serde(default)]
    pub nested: Vec<String>,
}

/// A value mirrored into a URL query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlVariable {
    pub uid: String,
    #[serde(default)]
    pub default: Value,
    pub query: String,
}

/// A server-side dataset, optionally filtered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataVariable {
    pub uid: String,
    #[serde(default)]
    pub filters: Option<Value>,
}

/// A value computed from other variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedVariable {
    pub uid: String,
    pub variables: Vec<AnyVariable>,
    /// Subset of `variables` whose changes trigger recomputation.
    /// `None` means all of them.
    #[serde(default)]
    pub deps: Option<Vec<AnyVariable>>,
    #[serde(default)]
    pub nested: Vec<String>,
}

/// A dataset computed from other variables, optionally filtered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedDataVariable {
    pub uid: String,
    pub variables: Vec<AnyVariable>,
    #[serde(default)]
    pub deps: Option<Vec<AnyVariable>>,
    #[serde(default)]
    pub filters: Option<Value>,
}

/// Request-scoped parameters that distinguish otherwise identical handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestExtras {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RequestExtras {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Canonical serialized form; `headers` is key-ordered.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(&self.headers).unwrap_or_default()
    }
}

impl FamilyParam for RequestExtras {
    fn family_key(&self) -> String {
        self.cache_key()
    }
}

/// Value of a trigger atom.
///
/// `inc` only ever grows. `force` is cleared by whoever consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerIndexValue {
    pub force: bool,
    pub inc: u64,
}

/// Last known inputs and output of a derived computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyCacheEntry {
    pub args: Vec<Value>,
    #[serde(rename = "cacheKey")]
    pub cache_key: String,
    pub result: Value,
}

/// Follow `nested` keys into `value`; a missing key yields `null`.
pub fn resolve_nested(value: Value, nested: &[String]) -> Value {
    nested.iter().fold(value, |current, key| match current {
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Null),
        _ => Value::Null,
    })
}
