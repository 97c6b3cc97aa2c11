use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PauseConfig;
use crate::entity::{Entity, EntityCore, EntityRef, Location, Startable};
use crate::errors::{FlowError, Result};
use crate::sensors::Sensors;

/// Waits for the configured duration on every start.
///
/// The wait ends early, as a failure, when the shared cancellation token fires
/// or [`Pause::interrupt`] is called.
#[derive(Debug)]
pub struct Pause {
    core: EntityCore,
    config: PauseConfig,
    cancellation: CancellationToken,
    current: parking_lot::Mutex<Option<CancellationToken>>,
}

impl Pause {
    pub fn new(core: EntityCore, config: PauseConfig, cancellation: CancellationToken) -> Self {
        Self {
            core,
            config,
            cancellation,
            current: parking_lot::Mutex::new(None),
        }
    }

    /// Interrupt the wait in progress, if any.
    pub fn interrupt(&self) {
        if let Some(token) = self.current.lock().as_ref() {
            token.cancel();
        }
    }

    async fn wait(&self) -> Result<()> {
        let token = self.cancellation.child_token();
        *self.current.lock() = Some(token.clone());

        let duration = self.config.duration;
        let mut guard = WaitGuard {
            pause: self,
            started: Instant::now(),
            settled: false,
        };
        debug!(entity = self.core.id(), ?duration, "Pausing");
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(FlowError::InterruptedWait {
                duration,
                elapsed: guard.started.elapsed(),
            }),
            _ = tokio::time::sleep(duration) => Ok(()),
        };
        guard.settled = true;
        result
    }
}

/// Clears the in-flight token when a wait ends. A wait dropped before it
/// settles leaves the pause on fire.
struct WaitGuard<'a> {
    pause: &'a Pause,
    started: Instant,
    settled: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        *self.pause.current.lock() = None;
        if !self.settled {
            warn!(entity = self.pause.core.id(), "Pause abandoned before completing");
            self.pause.core.fail_start(&FlowError::InterruptedWait {
                duration: self.pause.config.duration,
                elapsed: self.started.elapsed(),
            });
        }
    }
}

impl Entity for Pause {
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
impl Startable for Pause {
    async fn start(&self, locations: &[Location]) -> Result<()> {
        self.core.begin_start(locations);
        let result = self.wait().await;
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
