use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::format_duration;
use crate::failure::ChildFailures;
use crate::script::EngineError;

/// Format a YAML error for user-friendly display, including the field path
fn format_yaml_error(e: &serde_path_to_error::Error<serde_yaml::Error>) -> String {
    let path = e.path().to_string();
    let inner = e.inner();
    let msg = inner.to_string();

    let located = if let Some(loc) = inner.location() {
        format!("Line {}, Column {}: {}", loc.line(), loc.column(), msg)
    } else {
        msg
    };

    if path.is_empty() || path == "." {
        located
    } else {
        format!("{}: {}", path, located)
    }
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Cannot find the script engine for [{0}]")]
    EngineNotFound(String),

    #[error("Failed to resolve binding '{name}' to entity '{target}': {reason}")]
    BindingResolution {
        name: String,
        target: String,
        reason: String,
    },

    #[error("Cannot find script file [{0}]")]
    ScriptFileNotFound(String),

    #[error("Error while reading script file [{location}]: {source}")]
    ScriptIo {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failure while running script: {0}")]
    ScriptEvaluation(#[source] EngineError),

    #[error("Script engine for [{0}] does not support invokable functions")]
    InvocationUnsupported(String),

    #[error("Function [{0}] is not defined by the script")]
    FunctionNotFound(String),

    #[error("Error invoking function [{function}]: {source}")]
    FunctionInvocation {
        function: String,
        #[source]
        source: EngineError,
    },

    #[error("Incorrect return type for script evaluation result [{0}]. Expected boolean.")]
    ConditionTypeMismatch(String),

    #[error(transparent)]
    AggregatedChildFailure(#[from] ChildFailures),

    #[error("Pause of {} interrupted after {}", format_duration(.duration), format_duration(.elapsed))]
    InterruptedWait { duration: Duration, elapsed: Duration },

    #[error("Entity {entity} failed: {message}")]
    EntityFailed { entity: String, message: String },

    #[error("Sensor '{0}' is owned by the entity lifecycle and cannot be set directly")]
    ReservedSensor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse blueprint '{path}':\n  {}", format_yaml_error(.source))]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_yaml::Error>,
    },

    #[error("Blueprint not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Convenience constructor for failures raised by resource implementations.
    pub fn entity_failed(entity: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::EntityFailed {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
