//! Collaborators shared by every entity of one tree.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::directory::{EntityDirectory, LookupError};
use crate::entity::EntityRef;
use crate::script::EngineRegistry;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ExecutionContext {
    engines: Arc<EngineRegistry>,
    directory: Arc<dyn EntityDirectory>,
    cancellation: CancellationToken,
    lookup_timeout: Duration,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("engines", &self.engines)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    pub fn new(engines: Arc<EngineRegistry>, directory: Arc<dyn EntityDirectory>) -> Self {
        Self {
            engines,
            directory,
            cancellation: CancellationToken::new(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Interrupt pending pauses and lookups of every entity sharing this context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolve an entity id through the directory, giving up on cancellation
    /// or after the lookup timeout.
    pub async fn resolve_entity(&self, id: &str) -> Result<EntityRef, LookupError> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(LookupError::Cancelled),
            found = tokio::time::timeout(self.lookup_timeout, self.directory.lookup(id)) => {
                found.unwrap_or(Err(LookupError::TimedOut(self.lookup_timeout)))
            }
        }
    }
}
