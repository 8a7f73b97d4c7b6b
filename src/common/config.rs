//! Configuration handling
//!
//! Values are layered, lowest precedence first: built-in defaults, the TOML
//! configuration file, the `ARCHI_MCP_HOST` / `ARCHI_MCP_PORT` environment
//! variables, and finally command-line overrides.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Environment variable selecting the API host
pub const HOST_ENV: &str = "ARCHI_MCP_HOST";
/// Environment variable selecting the API port
pub const PORT_ENV: &str = "ARCHI_MCP_PORT";

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Target server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Readiness probe settings
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Location of the API server under test
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_scheme() -> String {
    "http".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8765
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Timeout for ordinary API requests
    #[serde(default = "default_request")]
    pub request_secs: u64,

    /// Timeout for each readiness probe
    #[serde(default = "default_probe")]
    pub probe_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: default_request(),
            probe_secs: default_probe(),
        }
    }
}

fn default_request() -> u64 {
    60
}
fn default_probe() -> u64 {
    5
}

impl Timeouts {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

/// Readiness probe settings
#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessConfig {
    /// Maximum number of `/status` calls
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    40
}
fn default_delay_ms() -> u64 {
    500
}

impl ReadinessConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Command-line overrides, applied last
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub attempts: Option<u32>,
    pub delay_ms: Option<u64>,
}

impl Config {
    /// Load configuration from an explicit file, or the default config file
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Apply `ARCHI_MCP_HOST` / `ARCHI_MCP_PORT` from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply host/port variables using the given lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.trim().is_empty()) {
            self.server.port = port.trim().parse().map_err(|_| {
                Error::Config(format!("{PORT_ENV} must be a port number, got '{port}'"))
            })?;
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeouts.request_secs = secs;
        }
        if let Some(attempts) = overrides.attempts {
            self.readiness.attempts = attempts;
        }
        if let Some(delay) = overrides.delay_ms {
            self.readiness.delay_ms = delay;
        }
    }

    /// Full resolution: file, then environment, then overrides
    pub fn resolve(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = Self::load(explicit)?;
        config.apply_env()?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Base URL of the API server, e.g. `http://127.0.0.1:8765`
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.server.scheme, self.server.host, self.server.port
        )
    }
}
