use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::LoopConfig;
use crate::entity::{Entity, EntityCore, EntityRef, Location, Startable};
use crate::errors::Result;
use crate::sensors::{LOOP_IGNORED_FAILURES, LOOP_ITERATION, Sensors};

/// Starts its children on the first pass and restarts them on every later
/// pass.
#[derive(Debug)]
pub struct Loop {
    core: EntityCore,
    config: LoopConfig,
}

impl Loop {
    pub fn new(core: EntityCore, config: LoopConfig) -> Self {
        Self { core, config }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    async fn run_passes(&self, locations: &[Location]) -> Result<()> {
        let mut ignored: u64 = 0;
        for pass in 0..self.config.count.max(0) {
            self.core
                .sensors()
                .publish(LOOP_ITERATION, serde_json::Value::from(pass));
            for child in self.core.children() {
                let Some(startable) = child.as_startable() else {
                    continue;
                };
                let result = if pass == 0 {
                    debug!(entity = self.core.id(), pass, child = child.id(), "Starting child");
                    startable.start(locations).await
                } else {
                    debug!(entity = self.core.id(), pass, child = child.id(), "Restarting child");
                    startable.restart().await
                };
                match result {
                    Ok(()) => {}
                    Err(e) if self.config.ignore_exceptions => {
                        warn!(
                            entity = self.core.id(),
                            pass,
                            child = child.id(),
                            "Ignoring child failure: {}",
                            e
                        );
                        ignored += 1;
                        self.core
                            .sensors()
                            .publish(LOOP_IGNORED_FAILURES, serde_json::Value::from(ignored));
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }
}

impl Entity for Loop {
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
impl Startable for Loop {
    async fn start(&self, locations: &[Location]) -> Result<()> {
        self.core.begin_start(locations);
        let result = self.run_passes(locations).await;
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
