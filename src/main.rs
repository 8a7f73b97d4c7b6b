//! Archi smoke - end-to-end smoke test for the Archi MCP modeling API
//!
//! Exit codes: 0 when the flow completed or no model is open, 1 when the
//! server never became ready, 2 when a required step failed, 3 when the run
//! could not be set up.

use std::path::PathBuf;
use std::process;

use archi_smoke::common::{config::Overrides, logging, Config};
use archi_smoke::http::ApiClient;
use archi_smoke::{Error, Scenario, StepRunner};
use archi_smoke::commands::Commands;
use clap::Parser;

#[derive(Parser)]
#[command(name = "archi-smoke", about = "Smoke test for the Archi MCP HTTP API")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API host, overrides ARCHI_MCP_HOST
    #[arg(long, global = true)]
    host: Option<String>,

    /// API port, overrides ARCHI_MCP_PORT
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Readiness attempts before giving up
    #[arg(long, global = true)]
    attempts: Option<u32>,

    /// Delay between readiness attempts in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            timeout_secs: self.timeout,
            attempts: self.attempts,
            delay_ms: self.delay_ms,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    logging::init_cli(cli.verbose, !cli.no_color);

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    };
    process::exit(code);
}

async fn run(cli: &Cli) -> Result<i32, Error> {
    let config = Config::resolve(cli.config.as_deref(), &cli.overrides())?;
    let client = ApiClient::new(&config.base_url(), config.timeouts.request())?;
    let command = cli.command.unwrap_or_default();

    tracing::debug!(?command, base = %config.base_url(), "starting");

    let steps = StepRunner::new();
    let outcome = Scenario::new(&client, &steps, &config)
        .run_phases(command.phases())
        .await;

    tracing::info!(?outcome, "run finished");
    Ok(outcome.exit_code())
}
