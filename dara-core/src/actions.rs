//! Client-side action handlers.
//!
//! Actions arrive as JSON tagged by `name`. Each handler mutates variables
//! through the [`Store`], which in turn re-renders whatever subscribed to
//! the affected handles.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ActionError;
use crate::store::Store;
use crate::variable::{AnyVariable, RequestExtras};

/// Everything an action handler needs.
#[derive(Clone)]
pub struct ActionContext {
    pub store: Store,
    pub extras: RequestExtras,
}

impl ActionContext {
    pub fn new(store: Store, extras: RequestExtras) -> Self {
        Self { store, extras }
    }
}

/// A client-side action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ActionImpl {
    /// Reset variables to their defaults, in order.
    ResetVariables { variables: Vec<Value> },

    /// Ask a derived variable to recompute.
    TriggerVariable {
        variable: AnyVariable,
        #[serde(default)]
        force: bool,
    },
}

impl ActionImpl {
    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Run `action`.
pub fn dispatch(ctx: &ActionContext, action: &ActionImpl) -> Result<(), ActionError> {
    match action {
        ActionImpl::ResetVariables { variables } => reset_variables(ctx, variables),
        ActionImpl::TriggerVariable { variable, force } => trigger_variable(ctx, variable, *force),
    }
}

/// Reset each variable in order; entries that are not variables are skipped.
///
/// - derived and derived data variables are force-recomputed
/// - URL variables are set to their default, which also rewrites the query
/// - data variables are left alone
/// - plain variables are reset to their declared default
///
/// Stops at the first failure; later variables are not touched.
pub fn reset_variables(ctx: &ActionContext, variables: &[Value]) -> Result<(), ActionError> {
    for variable in variables.iter().filter_map(AnyVariable::from_value) {
        debug!(uid = variable.uid(), kind = %variable.kind(), "resetting variable");
        match &variable {
            AnyVariable::Derived(_) | AnyVariable::DerivedData(_) => {
                ctx.store.trigger_variable(&variable, true)?;
            }
            AnyVariable::Url(v) => {
                ctx.store.set_url_variable(v, v.default.clone());
            }
            AnyVariable::Data(_) => {}
            AnyVariable::Plain(v) => {
                ctx.store
                    .get_or_register_plain_variable(v, &ctx.extras)
                    .reset();
            }
        }
    }
    Ok(())
}

/// Bump the trigger of `variable`.
pub fn trigger_variable(
    ctx: &ActionContext,
    variable: &AnyVariable,
    force: bool,
) -> Result<(), ActionError> {
    ctx.store.trigger_variable(variable, force)?;
    Ok(())
}
