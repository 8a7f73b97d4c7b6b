//! Smoke scenario
//!
//! Drives the modeling API through its full create/read/update/delete cycle
//! and verifies that nothing created along the way is left behind.

pub mod cleanup;
pub mod executor;
pub mod fixtures;
pub mod readiness;
pub mod routes;
pub mod scenario;
pub mod step;

pub use cleanup::{CleanupLedger, ResourceKind};
pub use executor::{AdaptiveExecutor, BatchOutcome, ExecutionPath};
pub use readiness::wait_ready;
pub use scenario::{Phase, RunOutcome, Scenario, Severity};
pub use step::StepRunner;
