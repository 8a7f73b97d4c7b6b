//! Configuration file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/archi-smoke/`
//! - macOS: `~/Library/Application Support/archi-smoke/`
//! - Windows: `%APPDATA%\archi-smoke\`

use std::path::PathBuf;

/// Application name used for the configuration directory
const APP_NAME: &str = "archi-smoke";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the default configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
