//! Logging and tracing configuration
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for the
//! step report printed by the step runner.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a given `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "archi_smoke=info,warn",
        1 => "archi_smoke=debug,info",
        _ => "archi_smoke=trace,debug",
    }
}

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable. Without it the
/// level is INFO for this crate and WARN for dependencies, raised by `-v`.
pub fn init_cli(verbosity: u8, ansi: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(verbosity > 0)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
