//! Entity model: the capability traits and the state shared by every entity.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::errors::{FlowError, Result};
use crate::failure::{FailureCollector, Phase};
use crate::lifecycle::Lifecycle;
use crate::sensors::Sensors;

pub type EntityRef = Arc<dyn Entity>;

/// Opaque deployment-target handle passed through `start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node of the entity tree as its parent and observers see it.
///
/// Nothing here writes lifecycle state: the reserved sensors are only
/// reachable through the entity's own [`EntityCore`].
pub trait Entity: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn sensors(&self) -> &Sensors;

    /// Direct children in declared order.
    fn children(&self) -> &[EntityRef];

    /// The lifecycle capability, if this entity has one. Children without it
    /// are skipped by every dispatcher.
    fn as_startable(&self) -> Option<&dyn Startable> {
        None
    }
}

/// Lifecycle contract.
#[async_trait]
pub trait Startable: Send + Sync {
    async fn start(&self, locations: &[Location]) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Locations passed to the most recent `start`.
    fn last_locations(&self) -> Vec<Location>;

    /// Stop, then start again with the previously used locations.
    async fn restart(&self) -> Result<()> {
        self.stop().await?;
        let locations = self.last_locations();
        self.start(&locations).await
    }
}

/// State owned by one entity: identity, sensors, children and remembered
/// locations, plus the lifecycle transition helpers.
///
/// Children are fixed at construction.
pub struct EntityCore {
    id: String,
    name: String,
    sensors: Sensors,
    children: Vec<EntityRef>,
    locations: RwLock<Vec<Location>>,
}

impl fmt::Debug for EntityCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field(
                "children",
                &self.children.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .field("state", &self.state())
            .finish()
    }
}

impl EntityCore {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            sensors: Sensors::new(),
            children: Vec::new(),
            locations: RwLock::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_child(mut self, child: EntityRef) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = EntityRef>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sensors(&self) -> &Sensors {
        &self.sensors
    }

    pub fn children(&self) -> &[EntityRef] {
        &self.children
    }

    pub fn state(&self) -> Option<Lifecycle> {
        self.sensors.service_state()
    }

    pub fn last_locations(&self) -> Vec<Location> {
        self.locations.read().clone()
    }

    fn transition(&self, to: Lifecycle) {
        let from = self.state();
        if !Lifecycle::allows(from, to) {
            warn!(
                entity = %self.id,
                from = from.map(|s| s.as_str()).unwrap_or("none"),
                to = to.as_str(),
                "Ignoring invalid lifecycle transition"
            );
            return;
        }
        trace!(entity = %self.id, state = to.as_str(), "Lifecycle transition");
        self.sensors.publish_lifecycle(to);
    }

    /// Enter `Starting` and remember `locations` for later restarts.
    pub fn begin_start(&self, locations: &[Location]) {
        *self.locations.write() = locations.to_vec();
        self.transition(Lifecycle::Starting);
    }

    /// Settle a start: `Running` on success, `OnFire` on failure. The result is
    /// passed through unchanged.
    pub fn finish_start(&self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.transition(Lifecycle::Running);
                Ok(())
            }
            Err(e) => {
                self.fail_start(&e);
                Err(e)
            }
        }
    }

    /// Put a start that cannot complete on fire.
    pub fn fail_start(&self, error: &FlowError) {
        error!(entity = %self.id, "Start failed: {}", error);
        self.transition(Lifecycle::OnFire);
    }

    pub fn begin_stop(&self) {
        self.transition(Lifecycle::Stopping);
    }

    pub fn finish_stop(&self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.transition(Lifecycle::Stopped);
                Ok(())
            }
            Err(e) => {
                error!(entity = %self.id, "Stop failed: {}", e);
                self.transition(Lifecycle::OnFire);
                Err(e)
            }
        }
    }

    /// Start every startable child in order, collecting failures.
    pub async fn start_children(&self, locations: &[Location]) -> Result<()> {
        self.start_selected(self.children.iter(), locations).await
    }

    /// Start the given children in order, collecting failures.
    pub async fn start_selected<'a>(
        &self,
        children: impl Iterator<Item = &'a EntityRef> + Send,
        locations: &[Location],
    ) -> Result<()> {
        let mut failures = FailureCollector::new(self.id.as_str(), Phase::Start);
        for child in children {
            let Some(startable) = child.as_startable() else {
                debug!(entity = %self.id, child = child.id(), "Skipping child without lifecycle");
                continue;
            };
            debug!(entity = %self.id, child = child.id(), "Starting child");
            if let Err(e) = startable.start(locations).await {
                failures.record(child.id(), e);
            }
        }
        failures.finish()
    }

    /// Stop every startable child in order, collecting failures.
    pub async fn stop_children(&self) -> Result<()> {
        let mut failures = FailureCollector::new(self.id.as_str(), Phase::Stop);
        for child in &self.children {
            let Some(startable) = child.as_startable() else {
                continue;
            };
            debug!(entity = %self.id, child = child.id(), "Stopping child");
            if let Err(e) = startable.stop().await {
                failures.record(child.id(), e);
            }
        }
        failures.finish()
    }
}

/// Plain grouping entity with the default lifecycle: starts and stops its
/// children in order.
#[derive(Debug)]
pub struct BasicEntity {
    core: EntityCore,
}

impl BasicEntity {
    pub fn new(core: EntityCore) -> Self {
        Self { core }
    }
}

impl Entity for BasicEntity {
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
impl Startable for BasicEntity {
    async fn start(&self, locations: &[Location]) -> Result<()> {
        self.core.begin_start(locations);
        let result = self.core.start_children(locations).await;
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
