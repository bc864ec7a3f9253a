//! Shared test utilities for icon-worker integration tests.
//!
//! This module provides:
//! - `TestHarness`: a controller wired to in-memory stores and queues
//! - Builders for source images and file records

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
