//! Entity that counts lifecycle calls in its sensors

use async_trait::async_trait;
use cadence_flow::{
    Entity, EntityCore, EntityRef, FlowError, Location, Result, Startable,
    sensors::Sensors,
};
use std::sync::Arc;

pub const START_COUNT: &str = "test.start_count";
pub const STOP_COUNT: &str = "test.stop_count";
pub const RESTART_COUNT: &str = "test.restart_count";

/// Counts `start`, `stop` and `restart` calls.
///
/// `restart` only counts: it does not go through `stop` and `start`. It can be
/// told to fail on the N-th restart, and `start` can be told to fail always.
pub struct TestEntity {
    core: EntityCore,
    fail_on_restart: Option<i64>,
    fail_on_start: bool,
}

impl TestEntity {
    pub fn new(id: &str) -> Self {
        let core = EntityCore::new(id);
        for key in [START_COUNT, STOP_COUNT, RESTART_COUNT] {
            // Counters start at zero so assertions never see a missing sensor.
            core.sensors()
                .set(key, 0)
                .expect("counter sensors are not reserved");
        }
        Self {
            core,
            fail_on_restart: None,
            fail_on_start: false,
        }
    }

    /// Fail when the restart counter reaches `n`.
    pub fn failing_on_restart(mut self, n: i64) -> Self {
        self.fail_on_restart = Some(n);
        self
    }

    pub fn failing_on_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    pub fn into_ref(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn start_count(&self) -> i64 {
        self.count(START_COUNT)
    }

    pub fn stop_count(&self) -> i64 {
        self.count(STOP_COUNT)
    }

    pub fn restart_count(&self) -> i64 {
        self.count(RESTART_COUNT)
    }

    fn count(&self, key: &str) -> i64 {
        self.core.sensors().get_as(key).unwrap_or(0)
    }

    fn bump(&self, key: &str) -> Result<i64> {
        self.core.sensors().increment(key, 1)
    }
}

impl Entity for TestEntity {
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
impl Startable for TestEntity {
    async fn start(&self, locations: &[Location]) -> Result<()> {
        self.core.begin_start(locations);
        let result = self.bump(START_COUNT).and_then(|_| {
            if self.fail_on_start {
                Err(FlowError::entity_failed(self.core.id(), "start failure requested"))
            } else {
                Ok(())
            }
        });
        self.core.finish_start(result)
    }

    async fn stop(&self) -> Result<()> {
        self.core.begin_stop();
        let result = self.bump(STOP_COUNT).map(|_| ());
        self.core.finish_stop(result)
    }

    fn last_locations(&self) -> Vec<Location> {
        self.core.last_locations()
    }

    async fn restart(&self) -> Result<()> {
        let count = self.bump(RESTART_COUNT)?;
        if self.fail_on_restart == Some(count) {
            return Err(FlowError::entity_failed(
                self.core.id(),
                format!("restart {} failure requested", count),
            ));
        }
        Ok(())
    }
}
