//! Drives one script evaluation from configuration to result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::{InvokeError, ResolvedArgument, ScriptEngine, ScriptValue};
use crate::config::{BindingTarget, ScriptConfig};
use crate::context::ExecutionContext;
use crate::entity::{EntityCore, EntityRef};
use crate::errors::{FlowError, Result};
use crate::sensors::SCRIPT_RESULT;

/// Evaluates a [`ScriptConfig`] on behalf of an entity.
#[derive(Debug)]
pub struct ScriptRunner {
    config: ScriptConfig,
    context: Arc<ExecutionContext>,
}

impl ScriptRunner {
    pub fn new(config: ScriptConfig, context: Arc<ExecutionContext>) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Evaluate the script, invoke the configured function if any, and return
    /// the final result. The result is also published on `owner`'s
    /// `script.result` sensor when it has a JSON form.
    pub async fn run(&self, owner: &EntityCore) -> Result<ScriptValue> {
        let language = self.config.language.as_str();
        let engine = self
            .context
            .engines()
            .get(language)
            .ok_or_else(|| FlowError::EngineNotFound(language.to_string()))?;

        let bindings = self.resolve_bindings().await?;
        let (source, origin) = self.load_source().await?;

        let evaluation = Evaluation {
            language: language.to_string(),
            source,
            origin,
            invoke: self.config.invoke.clone(),
            args: self.config.args.clone(),
            bindings,
            deadline: self.config.timeout.map(|timeout| Instant::now() + timeout),
        };
        let value = tokio::task::spawn_blocking(move || evaluation.run(engine.as_ref()))
            .await
            .map_err(|e| FlowError::Internal(format!("Script evaluation task failed: {}", e)))??;

        debug!(entity = owner.id(), result = %value, "Script evaluated");
        if let Some(json) = value.to_json() {
            owner.sensors().publish(SCRIPT_RESULT, json);
        }
        Ok(value)
    }

    async fn resolve_bindings(&self) -> Result<BTreeMap<String, EntityRef>> {
        let mut resolved = BTreeMap::new();
        for (name, target) in &self.config.bindings {
            let entity = match target {
                BindingTarget::Entity(entity) => entity.clone(),
                BindingTarget::Id(id) => self.context.resolve_entity(id).await.map_err(|e| {
                    FlowError::BindingResolution {
                        name: name.clone(),
                        target: id.clone(),
                        reason: e.to_string(),
                    }
                })?,
            };
            resolved.insert(name.clone(), entity);
        }
        Ok(resolved)
    }

    /// The file when configured, else the inline script.
    async fn load_source(&self) -> Result<(String, String)> {
        if let Some(file) = &self.config.file {
            let path = file.to_path()?;
            let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FlowError::ScriptFileNotFound(file.to_string())
                } else {
                    FlowError::ScriptIo {
                        location: file.to_string(),
                        source: e,
                    }
                }
            })?;
            return Ok((source, file.to_string()));
        }
        match &self.config.script {
            Some(script) => Ok((script.clone(), "script".to_string())),
            None => Err(FlowError::Config(
                "either 'script' or 'file' must be configured".to_string(),
            )),
        }
    }
}

/// Everything one blocking evaluation needs.
struct Evaluation {
    language: String,
    source: String,
    origin: String,
    invoke: Option<String>,
    args: Vec<String>,
    bindings: BTreeMap<String, EntityRef>,
    deadline: Option<Instant>,
}

impl Evaluation {
    fn run(self, engine: &dyn ScriptEngine) -> Result<ScriptValue> {
        let mut scope = engine
            .new_scope(&self.bindings, self.deadline)
            .map_err(FlowError::ScriptEvaluation)?;
        let value = scope
            .eval(&self.source, &self.origin)
            .map_err(FlowError::ScriptEvaluation)?;

        let Some(function) = self.invoke else {
            return Ok(value);
        };
        if scope.invoker().is_none() {
            return Err(FlowError::InvocationUnsupported(self.language));
        }

        let args: Vec<ScriptValue> = self
            .args
            .iter()
            .map(|raw| ResolvedArgument::resolve(scope.as_mut(), raw).into_value())
            .collect();
        debug!(function = %function, ?args, "Invoking script function");

        let invoker = scope
            .invoker()
            .ok_or_else(|| FlowError::InvocationUnsupported(self.language.clone()))?;
        invoker.invoke(&function, args).map_err(|e| match e {
            InvokeError::NotFound(name) => FlowError::FunctionNotFound(name),
            InvokeError::Engine(source) => FlowError::FunctionInvocation { function, source },
        })
    }
}

#[cfg(test)]
mod tests;
