//! CLI command implementations.

pub mod config;
pub mod replay;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use racetrack_config::RacetrackConfig;

/// Loads the layered configuration for `project` (or the current directory).
pub fn load_config(project: Option<&Path>) -> Result<RacetrackConfig> {
    match project {
        Some(dir) => RacetrackConfig::load_from_dir(dir)
            .with_context(|| format!("Failed to load configuration from {}", dir.display())),
        None => RacetrackConfig::load().context("Failed to load configuration"),
    }
}
