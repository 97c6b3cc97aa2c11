//! Test utilities for the cadence workspace
//!
//! This crate provides a counting test entity, scripted engines and context
//! builders for exercising control entities, plus the integration suites.

pub mod helpers;

pub use helpers::context::{test_context, test_context_with};
pub use helpers::engines::EchoEngine;
pub use helpers::test_entity::{RESTART_COUNT, START_COUNT, STOP_COUNT, TestEntity};
pub use helpers::wait_utils::{WaitError, wait_for_state};
