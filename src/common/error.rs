//! Error types for the smoke harness
//!
//! HTTP-level and transport-level failures are deliberately absent here: they
//! are folded into an [`EndpointResult`](crate::http::EndpointResult) so that
//! callers branch on a status code, never on an error value. What remains are
//! the conditions that end a run early and the setup problems that prevent one
//! from starting.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the smoke harness
#[derive(Error, Debug)]
pub enum Error {
    // === Scenario Errors ===
    #[error("Server not reachable at {base}/status after {attempts} attempts")]
    NotReady { base: String, attempts: u32 },

    #[error("Precondition not met: {0}")]
    Precondition(String),

    #[error("Cleanup verification failed: {0}")]
    Verification(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    // === Client Setup Errors ===
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl Error {
    /// Create a not-ready error for the given base URL
    pub fn not_ready(base: &str, attempts: u32) -> Self {
        Self::NotReady {
            base: base.to_string(),
            attempts,
        }
    }

    /// Create a precondition error
    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Self::Precondition(message.into())
    }

    /// Process exit code for this error
    ///
    /// 1 and 2 are the scenario's own terminal outcomes; 3 marks a run that
    /// could not be started at all. A failed cleanup verification is only
    /// reported and never decides the exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotReady { .. } => 1,
            Error::Precondition(_) => 2,
            _ => 3,
        }
    }
}
