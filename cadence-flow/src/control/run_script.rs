use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use crate::config::ScriptConfig;
use crate::context::ExecutionContext;
use crate::entity::{Entity, EntityCore, EntityRef, Location, Startable};
use crate::errors::Result;
use crate::script::ScriptRunner;
use crate::sensors::Sensors;

/// Evaluates a script on every start. Children are not driven.
#[derive(Debug)]
pub struct RunScript {
    core: EntityCore,
    runner: ScriptRunner,
}

impl RunScript {
    pub fn new(core: EntityCore, config: ScriptConfig, context: Arc<ExecutionContext>) -> Self {
        Self {
            core,
            runner: ScriptRunner::new(config, context),
        }
    }
}

impl Entity for RunScript {
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
impl Startable for RunScript {
    async fn start(&self, locations: &[Location]) -> Result<()> {
        trace!(entity = self.core.id(), "Starting script");
        self.core.begin_start(locations);
        let result = self.runner.run(&self.core).await.map(|_| ());
        self.core.finish_start(result)
    }

    async fn stop(&self) -> Result<()> {
        self.core.begin_stop();
        self.core.finish_stop(Ok(()))
    }

    fn last_locations(&self) -> Vec<Location> {
        self.core.last_locations()
    }
}
