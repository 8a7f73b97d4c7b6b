//! Archi smoke - end-to-end smoke test for the Archi MCP modeling API
//!
//! Exercises a running server over HTTP/JSON: readiness, discovery, batch
//! entity operations with per-item fallback, view placement and cleanup.

pub mod commands;
pub mod common;
pub mod http;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Config, Error, Result};
pub use testing::{Phase, RunOutcome, Scenario, StepRunner};
