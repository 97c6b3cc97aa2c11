use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::ScriptConfig;
use crate::context::ExecutionContext;
use crate::entity::{Entity, EntityCore, EntityRef, Location, Startable};
use crate::errors::{FlowError, Result};
use crate::script::ScriptRunner;
use crate::sensors::{CONDITION_RESULT, Sensors};

/// Which children a conditional starts for each outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branching {
    /// True starts every child, false starts none.
    AllChildren,
    /// True starts the first child, false the second. Later children are
    /// never started.
    FirstOrSecond,
}

/// Starts children based on a boolean script result, evaluated afresh on
/// every start.
#[derive(Debug)]
pub struct Conditional {
    core: EntityCore,
    runner: ScriptRunner,
    branching: Branching,
}

impl Conditional {
    pub fn new(
        core: EntityCore,
        config: ScriptConfig,
        context: Arc<ExecutionContext>,
        branching: Branching,
    ) -> Self {
        Self {
            core,
            runner: ScriptRunner::new(config, context),
            branching,
        }
    }

    /// One-armed form.
    pub fn if_condition(
        core: EntityCore,
        config: ScriptConfig,
        context: Arc<ExecutionContext>,
    ) -> Self {
        Self::new(core, config, context, Branching::AllChildren)
    }

    /// Two-armed form.
    pub fn if_else(core: EntityCore, config: ScriptConfig, context: Arc<ExecutionContext>) -> Self {
        Self::new(core, config, context, Branching::FirstOrSecond)
    }

    pub fn branching(&self) -> Branching {
        self.branching
    }

    async fn evaluate(&self) -> Result<bool> {
        let result = self.runner.run(&self.core).await?;
        result
            .as_bool()
            .ok_or_else(|| FlowError::ConditionTypeMismatch(result.to_string()))
    }

    async fn dispatch(&self, locations: &[Location]) -> Result<()> {
        let outcome = self.evaluate().await?;
        self.core
            .sensors()
            .publish(CONDITION_RESULT, serde_json::Value::Bool(outcome));
        debug!(entity = self.core.id(), outcome, branching = ?self.branching, "Condition evaluated");

        let children = self.core.children();
        match (self.branching, outcome) {
            (Branching::AllChildren, true) => self.core.start_children(locations).await,
            (Branching::AllChildren, false) => Ok(()),
            (Branching::FirstOrSecond, true) => {
                self.core.start_selected(children.iter().take(1), locations).await
            }
            (Branching::FirstOrSecond, false) => {
                self.core
                    .start_selected(children.iter().skip(1).take(1), locations)
                    .await
            }
        }
    }
}

impl Entity for Conditional {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn display_name(&self) -> &str {
        self.core.name()
    }

    fn sensors(&self) -> &Sensors {
        self.core.sensors()
    }

    fn children(&self) -> &[EntityRef] {
        self.core.children()
    }

    fn as_startable(&self) -> Option<&dyn Startable> {
        Some(self)
    }
}

#[async_trait]
impl Startable for Conditional {
    async fn start(&self, locations: &[Location]) -> Result<()> {
        self.core.begin_start(locations);
        let result = self.dispatch(locations).await;
        self.core.finish_start(result)
    }

    async fn stop(&self) -> Result<()> {
        self.core.begin_stop();
        let result = self.core.stop_children().await;
        self.core.finish_stop(result)
    }

    fn last_locations(&self) -> Vec<Location> {
        self.core.last_locations()
    }
}
