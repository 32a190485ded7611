//! Adaptive burst sampling.
//!
//! A tracked unit (a location, or a location as seen by one thread) walks a
//! burst window of `burst_length` accesses. Each access consumes one slot of
//! the shuffled table for the unit's current level; when the window is used
//! up the unit moves one level down the density ladder, saturating at the
//! last level.
//!
//! # Level ladder
//!
//! Level 0 checks every access in the window. Each further level checks
//! fewer:
//!
//! ```text
//! linear    density(i) = burst - decay * i       while density(i) >= min
//! geometric density(i) = burst / decay^i         while density(i) >= min,
//!                                                stopping after a 0 density
//! ```
//!
//! Both ladders always contain level 0, because `min <= burst` is enforced
//! when the plan is built.

use std::sync::atomic::{AtomicU64, Ordering};

use racetrack_config::{AdaptiveConfig, DecayKind};
use racetrack_types::ThreadId;

use crate::SamplingError;
use crate::sampling::RandomSource;

/// Checked-slot count for every level, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPlan {
    burst_length: u32,
    densities: Vec<u32>,
}

impl LevelPlan {
    pub fn from_config(config: &AdaptiveConfig) -> Result<Self, SamplingError> {
        match config.decay {
            DecayKind::Linear => {
                Self::linear(config.burst_length, config.min_sampling, config.decay_rate)
            }
            DecayKind::Geometric => {
                Self::geometric(config.burst_length, config.min_sampling, config.decay_rate)
            }
        }
    }

    /// `(burst - min) / decay + 1` levels, stepping down by `decay`.
    pub fn linear(burst: u32, min: u32, decay: u32) -> Result<Self, SamplingError> {
        Self::check(burst, min, decay)?;
        let levels = (burst - min) / decay + 1;
        let densities = (0..levels).map(|i| burst - decay * i).collect();
        Ok(Self {
            burst_length: burst,
            densities,
        })
    }

    /// Divides by `decay` per level while the density stays at or above `min`.
    pub fn geometric(burst: u32, min: u32, decay: u32) -> Result<Self, SamplingError> {
        Self::check(burst, min, decay)?;
        if decay == 1 {
            return Err(SamplingError::NonTerminatingDecay(decay));
        }
        let mut densities = Vec::new();
        let mut density = burst;
        while density >= min {
            densities.push(density);
            if density == 0 {
                break;
            }
            density /= decay;
        }
        Ok(Self {
            burst_length: burst,
            densities,
        })
    }

    fn check(burst: u32, min: u32, decay: u32) -> Result<(), SamplingError> {
        if burst == 0 {
            return Err(SamplingError::ZeroBurstLength);
        }
        if min > burst {
            return Err(SamplingError::FloorAboveBurst { min, burst });
        }
        if decay == 0 {
            return Err(SamplingError::ZeroDecayRate);
        }
        Ok(())
    }

    pub fn burst_length(&self) -> u32 {
        self.burst_length
    }

    pub fn densities(&self) -> &[u32] {
        &self.densities
    }

    /// Index of the last (sparsest) level.
    pub fn max_level(&self) -> u32 {
        self.densities.len() as u32 - 1
    }
}

/// One shuffled burst window per level. Read-only once built.
#[derive(Debug)]
pub struct AdaptiveTable {
    burst_length: u32,
    levels: Vec<Box<[bool]>>,
}

impl AdaptiveTable {
    pub fn build(plan: &LevelPlan, rng: &RandomSource) -> Self {
        let burst = plan.burst_length as usize;
        let levels = plan
            .densities
            .iter()
            .map(|&density| rng.permutation(burst, density as usize))
            .collect();
        Self {
            burst_length: plan.burst_length,
            levels,
        }
    }

    pub fn burst_length(&self) -> u32 {
        self.burst_length
    }

    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32 - 1
    }

    #[inline]
    pub fn pick(&self, level: u32, slot: u32) -> bool {
        self.levels[level as usize][slot as usize]
    }

    /// Checked slots in the window of `level`.
    pub fn density(&self, level: u32) -> usize {
        self.levels[level as usize].iter().filter(|&&b| b).count()
    }
}

/// Position of one tracked unit within its burst window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstCounter {
    countdown: u32,
    level: u32,
}

impl BurstCounter {
    pub fn new(burst_length: u32) -> Self {
        Self {
            countdown: burst_length,
            level: 0,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Consumes one slot and reports whether this access is checked.
    #[inline]
    pub fn advance(&mut self, table: &AdaptiveTable) -> bool {
        self.countdown -= 1;
        let checked = table.pick(self.level, self.countdown);
        if self.countdown == 0 {
            self.countdown = table.burst_length();
            self.level = (self.level + 1).min(table.max_level());
        }
        checked
    }

    fn pack(self) -> u64 {
        (u64::from(self.level) << 32) | u64::from(self.countdown)
    }

    fn unpack(raw: u64) -> Self {
        Self {
            countdown: raw as u32,
            level: (raw >> 32) as u32,
        }
    }
}

/// Per-thread burst counters of one location.
///
/// Slot `t` is only ever written by thread `t`, so a plain load/store pair
/// is enough.
#[derive(Debug)]
pub struct ThreadBursts {
    cells: Box<[AtomicU64]>,
}

impl ThreadBursts {
    pub fn new(threads: usize, burst_length: u32) -> Self {
        let fresh = BurstCounter::new(burst_length).pack();
        Self {
            cells: (0..threads).map(|_| AtomicU64::new(fresh)).collect(),
        }
    }

    #[inline]
    pub fn advance(&self, thread: ThreadId, table: &AdaptiveTable) -> bool {
        let Some(cell) = self.cells.get(thread.as_usize()) else {
            return true;
        };
        let mut counter = BurstCounter::unpack(cell.load(Ordering::Relaxed));
        let checked = counter.advance(table);
        cell.store(counter.pack(), Ordering::Relaxed);
        checked
    }

    pub fn get(&self, thread: ThreadId) -> Option<BurstCounter> {
        self.cells
            .get(thread.as_usize())
            .map(|cell| BurstCounter::unpack(cell.load(Ordering::Relaxed)))
    }
}
