//! Shared test utilities for ddmap integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `Reconciler` to a scripted HTTP double and a manual clock
//! - Builders for resource configurations

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
