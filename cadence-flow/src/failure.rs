//! Aggregation of per-child failures within one dispatch pass.

use std::fmt;

use crate::errors::{FlowError, Result};

/// Which lifecycle operation a pass was dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => f.write_str("start"),
            Phase::Stop => f.write_str("stop"),
        }
    }
}

/// A failure raised by one child.
#[derive(Debug)]
pub struct ChildFailure {
    pub child: String,
    pub error: FlowError,
}

/// Every failure collected from the children of `entity` during one pass, in
/// child order. Never empty.
#[derive(Debug)]
pub struct ChildFailures {
    entity: String,
    phase: Phase,
    failures: Vec<ChildFailure>,
}

impl ChildFailures {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every child failure in child order. `source()` can only expose the
    /// first of them; walk this (or [`ChildFailures::causes`]) for the rest.
    pub fn failures(&self) -> &[ChildFailure] {
        &self.failures
    }

    /// The collected failures as error causes, in child order.
    pub fn causes(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
        self.failures
            .iter()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ChildFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {}'s children failed to {}",
            self.failures.len(),
            self.entity,
            self.phase
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.child, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ChildFailures {
    /// The first child failure.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes().next()
    }
}

/// Accumulates child failures without stopping the pass.
#[derive(Debug)]
pub struct FailureCollector {
    entity: String,
    phase: Phase,
    failures: Vec<ChildFailure>,
}

impl FailureCollector {
    pub fn new(entity: impl Into<String>, phase: Phase) -> Self {
        Self {
            entity: entity.into(),
            phase,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, child: impl Into<String>, error: FlowError) {
        self.failures.push(ChildFailure {
            child: child.into(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ok if nothing was recorded, otherwise one combined failure.
    pub fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(FlowError::AggregatedChildFailure(ChildFailures {
            entity: self.entity,
            phase: self.phase,
            failures: self.failures,
        }))
    }
}
