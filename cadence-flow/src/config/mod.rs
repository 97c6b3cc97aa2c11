//! Configuration for control entities and blueprints
//!
//! This module provides:
//! - `ScriptConfig` - script source, invocation and bindings shared by the
//!   script runner and both conditionals
//! - `LoopConfig` / `PauseConfig` - loop and pause settings
//! - `Blueprint` - a YAML entity tree that instantiates into live entities

mod blueprint;
mod duration;
mod script;

pub use blueprint::{Blueprint, EntityKind, EntitySpec};
pub use duration::{
    deserialize_duration, deserialize_optional_duration, format_duration, parse_duration,
};
pub use script::{BindingTarget, ScriptConfig, ScriptLocation};

use serde::Deserialize;
use std::time::Duration;

/// Loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    /// Number of passes; zero or negative means none.
    pub count: i64,
    /// Swallow child failures and keep looping.
    #[serde(rename = "ignore.exceptions", alias = "ignore_exceptions", default)]
    pub ignore_exceptions: bool,
}

impl LoopConfig {
    pub fn new(count: i64) -> Self {
        Self {
            count,
            ignore_exceptions: false,
        }
    }

    pub fn ignoring_exceptions(mut self, ignore: bool) -> Self {
        self.ignore_exceptions = ignore;
        self
    }
}

/// Pause settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PauseConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
}

impl PauseConfig {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}
