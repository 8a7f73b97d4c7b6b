//! Step runner
//!
//! Every API call the scenario makes goes through [`StepRunner::run`], which
//! prints the description before the call and the `{status, body}` pair after
//! it. The result is handed back untouched.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use colored::Colorize;
use serde_json::Value;

use crate::http::EndpointResult;

const TAG: &str = "[SMOKE]";

/// Observability wrapper around individual API calls
#[derive(Debug, Default)]
pub struct StepRunner {
    steps_run: AtomicUsize,
    quiet: bool,
}

impl StepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner that records steps without printing them
    pub fn quiet() -> Self {
        Self {
            steps_run: AtomicUsize::new(0),
            quiet: true,
        }
    }

    /// Log `description`, await `action`, log its result and return it
    pub async fn run<F>(&self, description: &str, action: F) -> EndpointResult
    where
        F: Future<Output = EndpointResult>,
    {
        let step = self.steps_run.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.quiet {
            println!("\n{} {}", TAG.cyan().bold(), description);
        }

        let result = action.await;

        tracing::debug!(step, status = result.status, "{description}");
        if !self.quiet {
            println!("{}", pretty(&result.report()));
        }
        result
    }

    /// Narrative line between steps
    pub fn note(&self, message: &str) {
        tracing::debug!("{message}");
        if !self.quiet {
            println!("\n{} {}", TAG.cyan().bold(), message);
        }
    }

    /// Diagnostic line on stderr
    pub fn problem(&self, message: &str) {
        tracing::warn!("{message}");
        if !self.quiet {
            eprintln!("{} {}", TAG.red().bold(), message);
        }
    }

    pub fn steps_run(&self) -> usize {
        self.steps_run.load(Ordering::Relaxed)
    }
}

/// Pretty-printed JSON, non-ASCII left as is
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
