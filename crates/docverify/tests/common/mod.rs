//! Shared test utilities for docverify integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring the services over a temporary database and object root
//! - Collaborator doubles that need neither poppler nor network access

pub mod doubles;
pub mod harness;

pub use doubles::*;
pub use harness::TestHarness;
