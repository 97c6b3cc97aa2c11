//! Script engines for tests

use cadence_flow::EntityRef;
use cadence_flow::script::{EngineError, ScriptEngine, ScriptScope, ScriptValue};
use std::collections::BTreeMap;
use std::time::Instant;

/// Engine registered as `echo`: evaluation returns the source text, `true`
/// and `false` become booleans. It has no function invocation.
#[derive(Debug, Default)]
pub struct EchoEngine;

struct EchoScope;

impl ScriptEngine for EchoEngine {
    fn language(&self) -> &str {
        "echo"
    }

    fn new_scope(
        &self,
        _bindings: &BTreeMap<String, EntityRef>,
        _deadline: Option<Instant>,
    ) -> Result<Box<dyn ScriptScope>, EngineError> {
        Ok(Box::new(EchoScope))
    }
}

impl ScriptScope for EchoScope {
    fn eval(&mut self, source: &str, _origin: &str) -> Result<ScriptValue, EngineError> {
        Ok(match source.trim() {
            "true" => ScriptValue::Boolean(true),
            "false" => ScriptValue::Boolean(false),
            other => ScriptValue::String(other.to_string()),
        })
    }

    fn try_expression(&mut self, _source: &str) -> Option<ScriptValue> {
        None
    }
}
