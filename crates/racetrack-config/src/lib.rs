//! Configuration management for racetrack
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (RACETRACK_* prefix, highest precedence)
//! 2. racetrack.local.toml (gitignored, local overrides)
//! 3. racetrack.toml (git-tracked, project config)
//! 4. ~/.config/racetrack/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! The values mirror the detector's tuning surface: how many thread ids to
//! provision for, whether per-rule counters are kept, and which sampling
//! policy decides which accesses are checked at all.

use anyhow::Result;
use racetrack_types::MAX_TID;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main racetrack configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacetrackConfig {
    pub detector: DetectorConfig,
    pub sampling: SamplingConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Upper bound (exclusive) on thread ids, at most `MAX_TID + 1`.
    /// Sizes per-thread tables.
    pub max_threads: u32,
    /// Keep per-rule operation counters.
    pub count_operations: bool,
    /// Seed for the sampling RNG; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_threads: 64,
            count_operations: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub scheme: SamplingScheme,
    pub count: CountConfig,
    pub adaptive: AdaptiveConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingScheme {
    /// Fixed-rate sampling.
    #[default]
    Count,
    /// Per-location burst sampling with decaying density.
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountConfig {
    pub mode: CountMode,
    /// Percentage of accesses to check, 0..=100.
    pub rate: u32,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            mode: CountMode::Uniform,
            rate: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CountMode {
    /// Independent random draw per access.
    #[default]
    Uniform,
    /// One shuffled 100-slot table consumed by every thread.
    GlobalPermutation,
    /// One shuffled 100-slot table per thread.
    PerThreadPermutation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Accesses per burst window.
    pub burst_length: u32,
    /// Smallest number of checked accesses per window.
    pub min_sampling: u32,
    /// Step (linear) or divisor (geometric) between levels.
    pub decay_rate: u32,
    pub decay: DecayKind,
    pub granularity: BurstGranularity,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            burst_length: 100,
            min_sampling: 10,
            decay_rate: 10,
            decay: DecayKind::Linear,
            granularity: BurstGranularity::PerThread,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DecayKind {
    /// Density drops by `decay_rate` per level.
    #[default]
    Linear,
    /// Density is divided by `decay_rate` per level.
    Geometric,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BurstGranularity {
    /// One burst counter per location.
    Global,
    /// One burst counter per (location, thread).
    #[default]
    PerThread,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Reports kept per static site by the bundled sinks.
    pub max_reports_per_site: u32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            max_reports_per_site: 1,
        }
    }
}

impl RacetrackConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file, without layering.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration that checks every access (no sampling).
    pub fn exhaustive() -> Self {
        Self::default()
    }

    /// Configuration with adaptive burst sampling.
    pub fn adaptive(burst_length: u32, min_sampling: u32, decay_rate: u32) -> Self {
        Self {
            sampling: SamplingConfig {
                scheme: SamplingScheme::Adaptive,
                adaptive: AdaptiveConfig {
                    burst_length,
                    min_sampling,
                    decay_rate,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Rejects values that would make the detector misbehave.
    ///
    /// Runs before any event is processed so a bad configuration fails fast.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detector.max_threads == 0 {
            return Err(ConfigError::invalid(
                "detector.max_threads",
                "must be at least 1",
            ));
        }
        if self.detector.max_threads > MAX_TID + 1 {
            return Err(ConfigError::invalid(
                "detector.max_threads",
                format!(
                    "{} exceeds the {} thread ids an epoch can encode",
                    self.detector.max_threads,
                    MAX_TID + 1
                ),
            ));
        }
        if self.reporting.max_reports_per_site == 0 {
            return Err(ConfigError::invalid(
                "reporting.max_reports_per_site",
                "must be at least 1",
            ));
        }
        self.sampling.validate()
    }
}

impl SamplingConfig {
    /// Checks the parameters of the selected scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.scheme {
            SamplingScheme::Count if self.count.rate > 100 => Err(ConfigError::invalid(
                "sampling.count.rate",
                format!("{} is outside 0..=100", self.count.rate),
            )),
            SamplingScheme::Count => Ok(()),
            SamplingScheme::Adaptive => self.adaptive.validate(),
        }
    }
}

impl AdaptiveConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.burst_length == 0 {
            return Err(ConfigError::invalid(
                "sampling.adaptive.burst_length",
                "must be at least 1",
            ));
        }
        if self.min_sampling > self.burst_length {
            return Err(ConfigError::invalid(
                "sampling.adaptive.min_sampling",
                format!("{} exceeds burst_length {}", self.min_sampling, self.burst_length),
            ));
        }
        match self.decay {
            DecayKind::Linear if self.decay_rate == 0 => Err(ConfigError::invalid(
                "sampling.adaptive.decay_rate",
                "linear decay needs a step of at least 1",
            )),
            DecayKind::Geometric if self.decay_rate < 2 => Err(ConfigError::invalid(
                "sampling.adaptive.decay_rate",
                "geometric decay needs a divisor of at least 2",
            )),
            _ => Ok(()),
        }
    }
}
