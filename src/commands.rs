//! CLI command definitions
//!
//! Defines the clap commands for the smoke harness.

use clap::Subcommand;

use crate::testing::Phase;

#[derive(Subcommand, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the full smoke scenario (default)
    #[default]
    Run,

    /// Wait until the server answers `/status`, then exit
    Wait,

    /// Readiness plus read-only discovery: status, OpenAPI, types, scripting
    #[command(alias = "disc")]
    Discover,
}

impl Commands {
    /// Phases this command runs, in order
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Commands::Run => Phase::ALL,
            Commands::Wait => Phase::WAIT,
            Commands::Discover => Phase::DISCOVERY,
        }
    }
}
