//! YAML entity trees.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{LoopConfig, PauseConfig, ScriptConfig};
use crate::context::ExecutionContext;
use crate::control::{Conditional, Loop, Pause, RunScript};
use crate::directory::EntityIndex;
use crate::entity::{BasicEntity, EntityCore, EntityRef, Location};
use crate::errors::{FlowError, Result};

/// Id given to a root without an explicit one.
pub const ROOT_ID: &str = "root";

/// A tree of entity definitions plus default start locations.
///
/// ```yaml
/// locations: [local]
/// root:
///   type: loop
///   count: 3
///   children:
///     - type: pause
///       duration: 100ms
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub locations: Vec<Location>,

    pub root: EntitySpec,

    /// Directory relative script files are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One node of a blueprint.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitySpec {
    /// Defaults to the parent's id followed by the child index.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub kind: EntityKind,

    #[serde(default)]
    pub children: Vec<EntitySpec>,
}

/// Entity type and its type-specific settings, keyed by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    Basic,
    RunScript(ScriptConfig),
    If(ScriptConfig),
    IfElse(ScriptConfig),
    Loop(LoopConfig),
    Pause(PauseConfig),
}

impl EntityKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Basic => "basic",
            EntityKind::RunScript(_) => "run_script",
            EntityKind::If(_) => "if",
            EntityKind::IfElse(_) => "if_else",
            EntityKind::Loop(_) => "loop",
            EntityKind::Pause(_) => "pause",
        }
    }
}

impl Blueprint {
    /// Load a blueprint file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FlowError::ConfigNotFound(path.to_path_buf())
            } else {
                FlowError::Io(e)
            }
        })?;

        let base_dir = path.parent().unwrap_or(Path::new("."));
        Self::parse(&contents, path, base_dir)
    }

    /// Parse blueprint text; relative script files resolve against `base_dir`.
    pub fn from_yaml(yaml: &str, base_dir: &Path) -> Result<Self> {
        Self::parse(yaml, Path::new("<inline>"), base_dir)
    }

    fn parse(contents: &str, path: &Path, base_dir: &Path) -> Result<Self> {
        let de = serde_yaml::Deserializer::from_str(contents);
        let mut blueprint: Blueprint =
            serde_path_to_error::deserialize(de).map_err(|e| FlowError::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        blueprint.base_dir = base_dir.to_path_buf();
        Ok(blueprint)
    }

    /// Build the live entity tree and register every entity in `index`.
    pub fn instantiate(
        &self,
        context: &Arc<ExecutionContext>,
        index: &EntityIndex,
    ) -> Result<EntityRef> {
        self.build(&self.root, ROOT_ID.to_string(), context, index)
    }

    fn build(
        &self,
        spec: &EntitySpec,
        default_id: String,
        context: &Arc<ExecutionContext>,
        index: &EntityIndex,
    ) -> Result<EntityRef> {
        let id = spec.id.clone().unwrap_or(default_id);
        let children = spec
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| self.build(child, format!("{}.{}", id, i), context, index))
            .collect::<Result<Vec<_>>>()?;

        let mut core = EntityCore::new(id.as_str()).with_children(children);
        if let Some(name) = &spec.name {
            core = core.with_name(name.as_str());
        }

        let entity: EntityRef = match &spec.kind {
            EntityKind::Basic => Arc::new(BasicEntity::new(core)),
            EntityKind::RunScript(config) => {
                Arc::new(RunScript::new(core, self.script(config), context.clone()))
            }
            EntityKind::If(config) => Arc::new(Conditional::if_condition(
                core,
                self.script(config),
                context.clone(),
            )),
            EntityKind::IfElse(config) => Arc::new(Conditional::if_else(
                core,
                self.script(config),
                context.clone(),
            )),
            EntityKind::Loop(config) => Arc::new(Loop::new(core, config.clone())),
            EntityKind::Pause(config) => Arc::new(Pause::new(
                core,
                config.clone(),
                context.cancellation().clone(),
            )),
        };

        index.register(&entity)?;
        debug!(entity = %id, kind = spec.kind.type_name(), "Instantiated entity");
        Ok(entity)
    }

    fn script(&self, config: &ScriptConfig) -> ScriptConfig {
        config.clone().resolve_file_against(&self.base_dir)
    }
}

#[cfg(test)]
mod tests;
