//! Where configuration files live.

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Checked-in project configuration.
pub const PROJECT_FILE: &str = "racetrack.toml";

/// Per-checkout overrides, kept out of version control.
pub const LOCAL_FILE: &str = "racetrack.local.toml";

/// Configuration file locations, user-level and per project.
pub struct Paths {
    dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            dirs: ProjectDirs::from("rs", "racetrack", "racetrack"),
        }
    }

    /// `~/.config/racetrack/config.toml` on Linux, the platform equivalent elsewhere.
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        let dirs = self.dirs.as_ref().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_FILE)
    }

    /// Nearest directory at or above `start` that holds a project file.
    pub fn find_project_dir(start: impl AsRef<Path>) -> Option<PathBuf> {
        start
            .as_ref()
            .ancestors()
            .find(|dir| Self::project_config_file(dir).is_file())
            .map(Path::to_path_buf)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
