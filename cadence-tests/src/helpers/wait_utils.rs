//! Async utilities to wait for lifecycle transitions

use cadence_flow::{Entity, Lifecycle};
use std::time::Duration;

/// Error type for wait operations
#[derive(Debug)]
pub enum WaitError {
    Timeout,
    Closed,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::Timeout => write!(f, "Wait operation timed out"),
            WaitError::Closed => write!(f, "Entity state channel closed"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Wait until `entity` reaches `expected`.
pub async fn wait_for_state(
    entity: &dyn Entity,
    expected: Lifecycle,
    timeout: Duration,
) -> Result<(), WaitError> {
    let mut rx = entity.sensors().subscribe_state();
    match tokio::time::timeout(timeout, rx.wait_for(|state| *state == Some(expected))).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(WaitError::Closed),
        Err(_) => Err(WaitError::Timeout),
    }
}
