//! Randomness behind sampling decisions.
//!
//! Two sources:
//! - **Entropy**: the thread-local generator, no shared state on the hot path
//! - **Seeded**: one `SmallRng` behind a mutex, reproducible across runs
//!
//! Only the uniform scheme draws per access. The permutation and adaptive
//! schemes draw once, while shuffling their tables.

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Source of sampling randomness.
#[derive(Debug)]
pub enum RandomSource {
    Entropy,
    Seeded(Mutex<SmallRng>),
}

impl RandomSource {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::Seeded(Mutex::new(SmallRng::seed_from_u64(seed))),
            None => Self::Entropy,
        }
    }

    /// Uniform draw in `0..100`.
    #[inline]
    pub fn percent(&self) -> u32 {
        match self {
            Self::Entropy => rand::thread_rng().gen_range(0..100),
            Self::Seeded(rng) => rng.lock().gen_range(0..100),
        }
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&self, slots: &mut [T]) {
        match self {
            Self::Entropy => slots.shuffle(&mut rand::thread_rng()),
            Self::Seeded(rng) => slots.shuffle(&mut *rng.lock()),
        }
    }

    /// A shuffled table of `len` slots with exactly `checked` of them true.
    pub fn permutation(&self, len: usize, checked: usize) -> Box<[bool]> {
        let mut table: Vec<bool> = (0..len).map(|i| i < checked).collect();
        self.shuffle(&mut table);
        table.into_boxed_slice()
    }
}
