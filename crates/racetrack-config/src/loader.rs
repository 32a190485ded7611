//! Layered configuration loading.
//!
//! Later layers override earlier ones key by key:
//! defaults, user file, `racetrack.toml`, `racetrack.local.toml`, environment.

use crate::{Paths, RacetrackConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// `RACETRACK_SAMPLING__COUNT__RATE=50` overrides `sampling.count.rate`.
const ENV_PREFIX: &str = "RACETRACK";

pub struct ConfigLoader {
    project_dir: PathBuf,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Loader rooted at the nearest ancestor of the current directory that
    /// holds a `racetrack.toml`, or the current directory itself.
    pub fn new() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            project_dir: Paths::find_project_dir(&cwd).unwrap_or(cwd),
            include_user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Ignore the user-level file (keeps test runs hermetic).
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Merges every layer, then validates the result.
    pub fn load(self) -> Result<RacetrackConfig> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&RacetrackConfig::default())?);

        let user_file = if self.include_user_config {
            Paths::new().user_config_file().ok()
        } else {
            None
        };
        let files = user_file.into_iter().chain([
            Paths::project_config_file(&self.project_dir),
            Paths::local_config_file(&self.project_dir),
        ]);
        for file in files.filter(|f| f.is_file()) {
            builder = builder.add_source(
                config::File::from(file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let merged: RacetrackConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        merged
            .validate()
            .context("Configuration failed validation")?;
        Ok(merged)
    }

}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
