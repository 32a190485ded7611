//! Sampling policy: decides, per access, whether the shadow-state rules run.
//!
//! A skipped access is not checked and leaves the location's shadow state
//! untouched. Schemes are fixed at construction; derived tables are built at
//! most once, on first use, and are read-only afterwards.

mod adaptive;
mod permutation;
mod rng;

use std::sync::OnceLock;

use parking_lot::Mutex;
use racetrack_config::{BurstGranularity, CountMode, SamplingConfig, SamplingScheme};
use racetrack_types::ThreadId;
use tracing::info;

pub use adaptive::{AdaptiveTable, BurstCounter, LevelPlan, ThreadBursts};
pub use permutation::PermutationCursor;
pub use rng::RandomSource;

use crate::SamplingError;
use crate::shadow::ShadowVar;

/// Slots in a count-scheme permutation table.
pub const PERMUTATION_LEN: usize = 100;

#[derive(Debug)]
enum Policy {
    Uniform { rate: u32 },
    GlobalPermutation { rate: u32 },
    PerThreadPermutation { rate: u32 },
    Adaptive {
        plan: LevelPlan,
        granularity: BurstGranularity,
        table: OnceLock<AdaptiveTable>,
    },
}

/// Burst storage a new shadow variable must carry for the active scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstLayout {
    None,
    Global { burst_length: u32 },
    PerThread { burst_length: u32, threads: usize },
}

/// The configured sampling scheme plus its derived runtime tables.
#[derive(Debug)]
pub struct Sampler {
    policy: Policy,
    rng: RandomSource,
    max_threads: usize,
    global: OnceLock<Mutex<PermutationCursor>>,
    per_thread: OnceLock<Box<[Mutex<Option<PermutationCursor>>]>>,
}

impl Sampler {
    /// Validates `config` and fixes the scheme.
    pub fn new(
        config: &SamplingConfig,
        max_threads: u32,
        seed: Option<u64>,
    ) -> Result<Self, SamplingError> {
        let policy = match config.scheme {
            SamplingScheme::Count => {
                let rate = config.count.rate;
                if rate > 100 {
                    return Err(SamplingError::RateOutOfRange(rate));
                }
                match config.count.mode {
                    CountMode::Uniform => Policy::Uniform { rate },
                    CountMode::GlobalPermutation => Policy::GlobalPermutation { rate },
                    CountMode::PerThreadPermutation => Policy::PerThreadPermutation { rate },
                }
            }
            SamplingScheme::Adaptive => Policy::Adaptive {
                plan: LevelPlan::from_config(&config.adaptive)?,
                granularity: config.adaptive.granularity,
                table: OnceLock::new(),
            },
        };

        Ok(Self {
            policy,
            rng: RandomSource::new(seed),
            max_threads: max_threads as usize,
            global: OnceLock::new(),
            per_thread: OnceLock::new(),
        })
    }

    /// True when every access is checked and no per-location state is needed.
    pub fn is_exhaustive(&self) -> bool {
        matches!(self.policy, Policy::Uniform { rate: 100 })
    }

    pub fn burst_layout(&self) -> BurstLayout {
        match &self.policy {
            Policy::Adaptive {
                plan, granularity, ..
            } => match granularity {
                BurstGranularity::Global => BurstLayout::Global {
                    burst_length: plan.burst_length(),
                },
                BurstGranularity::PerThread => BurstLayout::PerThread {
                    burst_length: plan.burst_length(),
                    threads: self.max_threads,
                },
            },
            _ => BurstLayout::None,
        }
    }

    /// Gives `thread` a fresh per-thread permutation (no-op for other schemes).
    pub fn on_thread_created(&self, thread: ThreadId) {
        if let Policy::PerThreadPermutation { rate } = self.policy {
            if let Some(slot) = self.per_thread_slots().get(thread.as_usize()) {
                *slot.lock() = Some(self.cursor(rate));
            }
        }
    }

    /// Should `thread`'s access to `var` be checked?
    #[inline]
    pub fn should_check(&self, thread: ThreadId, var: &ShadowVar) -> bool {
        match &self.policy {
            Policy::Uniform { rate } => match *rate {
                100 => true,
                0 => false,
                rate => self.rng.percent() < rate,
            },
            Policy::GlobalPermutation { rate } => self
                .global
                .get_or_init(|| Mutex::new(self.cursor(*rate)))
                .lock()
                .advance(),
            Policy::PerThreadPermutation { rate } => {
                match self.per_thread_slots().get(thread.as_usize()) {
                    Some(slot) => slot
                        .lock()
                        .get_or_insert_with(|| self.cursor(*rate))
                        .advance(),
                    None => true,
                }
            }
            Policy::Adaptive { plan, table, .. } => {
                var.advance_burst(thread, table.get_or_init(|| self.build_table(plan)))
            }
        }
    }

    fn cursor(&self, rate: u32) -> PermutationCursor {
        PermutationCursor::new(self.rng.permutation(PERMUTATION_LEN, rate as usize))
    }

    fn per_thread_slots(&self) -> &[Mutex<Option<PermutationCursor>>] {
        self.per_thread
            .get_or_init(|| (0..self.max_threads).map(|_| Mutex::new(None)).collect())
    }

    fn build_table(&self, plan: &LevelPlan) -> AdaptiveTable {
        let table = AdaptiveTable::build(plan, &self.rng);
        info!(
            burst_length = plan.burst_length(),
            levels = plan.densities().len(),
            "adaptive sampling table built"
        );
        table
    }
}
