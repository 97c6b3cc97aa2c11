//! Pluggable script evaluation.
//!
//! An [`EngineRegistry`] maps a language identifier to a [`ScriptEngine`].
//! Each evaluation gets a fresh [`ScriptScope`] holding the injected bindings;
//! engines that can call a named function after evaluation expose a
//! [`FunctionInvoker`] through [`ScriptScope::invoker`].

mod lua;
mod registry;
mod runner;
mod value;

pub use lua::LuaEngine;
pub use registry::EngineRegistry;
pub use runner::ScriptRunner;
pub use value::ScriptValue;

use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

use crate::entity::EntityRef;

/// Error reported by a script engine.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("function '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A scripting language implementation.
pub trait ScriptEngine: Send + Sync {
    fn language(&self) -> &str;

    /// Create a fresh evaluation scope with `bindings` injected as globals.
    ///
    /// Evaluation past `deadline` is aborted with an error.
    fn new_scope(
        &self,
        bindings: &BTreeMap<String, EntityRef>,
        deadline: Option<Instant>,
    ) -> Result<Box<dyn ScriptScope>, EngineError>;
}

/// One evaluation context. State defined by `eval` stays visible to later
/// calls on the same scope.
pub trait ScriptScope {
    /// Evaluate a script; `origin` names it in error messages.
    fn eval(&mut self, source: &str, origin: &str) -> Result<ScriptValue, EngineError>;

    /// Evaluate `source` as a single expression. `None` when it is not a valid
    /// expression, refers to an undefined name, or fails while evaluating.
    fn try_expression(&mut self, source: &str) -> Option<ScriptValue>;

    /// Function invocation capability, if the engine has one.
    fn invoker(&mut self) -> Option<&mut dyn FunctionInvoker> {
        None
    }
}

pub trait FunctionInvoker {
    fn invoke(&mut self, function: &str, args: Vec<ScriptValue>)
    -> Result<ScriptValue, InvokeError>;
}

/// An invocation argument after the expression-or-literal step.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArgument {
    Evaluated(ScriptValue),
    Literal(String),
}

impl ResolvedArgument {
    /// Evaluate `raw` as an expression in `scope`, keeping it as a literal
    /// string when that is not possible or when the result cannot be handed
    /// back to the engine intact (a function, for instance).
    pub fn resolve(scope: &mut dyn ScriptScope, raw: &str) -> Self {
        match scope.try_expression(raw) {
            Some(value) if value.is_transferable() => ResolvedArgument::Evaluated(value),
            _ => ResolvedArgument::Literal(raw.to_string()),
        }
    }

    pub fn into_value(self) -> ScriptValue {
        match self {
            ResolvedArgument::Evaluated(value) => value,
            ResolvedArgument::Literal(raw) => ScriptValue::String(raw),
        }
    }
}
