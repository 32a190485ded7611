//! Clocks attached to synchronization objects.
//!
//! Every lock, volatile, class and barrier gets its own mutex-guarded state,
//! created lazily on first use. Lookups clone the `Arc` out of the map and
//! release the map guard before the object's mutex is taken.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use racetrack_types::{BarrierId, ClassId, LockId, ThreadId, VectorClock, VolatileId};

/// Shared handle to one synchronization clock.
pub type ClockHandle = Arc<Mutex<VectorClock>>;

/// Side tables keyed by synchronization-object identity.
#[derive(Debug, Default)]
pub struct SyncState {
    locks: DashMap<LockId, ClockHandle>,
    volatiles: DashMap<VolatileId, ClockHandle>,
    classes: DashMap<ClassId, ClockHandle>,
    barriers: DashMap<BarrierId, Arc<Mutex<BarrierState>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock as of the most recent release of `lock`.
    pub fn lock_clock(&self, lock: LockId) -> ClockHandle {
        slot(&self.locks, lock)
    }

    /// Clock as of the most recent write of `volatile`.
    pub fn volatile_clock(&self, volatile: VolatileId) -> ClockHandle {
        slot(&self.volatiles, volatile)
    }

    /// Clock of the thread that finished initializing `class`.
    pub fn class_clock(&self, class: ClassId) -> ClockHandle {
        slot(&self.classes, class)
    }

    pub fn barrier(&self, barrier: BarrierId) -> Arc<Mutex<BarrierState>> {
        slot(&self.barriers, barrier)
    }
}

fn slot<K, V>(map: &DashMap<K, Arc<Mutex<V>>>, key: K) -> Arc<Mutex<V>>
where
    K: Eq + Hash,
    V: Default,
{
    if let Some(existing) = map.get(&key) {
        return Arc::clone(existing.value());
    }
    Arc::clone(map.entry(key).or_default().value())
}

// ============================================================================
// Barriers
// ============================================================================

/// One barrier, across all of its generations.
///
/// Entering merges into the current generation's clock. The first thread to
/// exit closes that generation, so threads entering afterwards start a fresh
/// clock while the stragglers of the closed generation still read the merged
/// value they were waiting on.
#[derive(Debug, Default)]
pub struct BarrierState {
    generation: u64,
    generations: HashMap<u64, Generation>,
    entries: HashMap<ThreadId, u64>,
}

#[derive(Debug, Default)]
struct Generation {
    clock: VectorClock,
    inside: usize,
}

impl BarrierState {
    /// Merges `clock` into the open generation and records the entry.
    pub fn enter(&mut self, thread: ThreadId, clock: &VectorClock) {
        let generation = self.generation;
        let slot = self.generations.entry(generation).or_default();
        slot.clock.max(clock);
        slot.inside += 1;
        if let Some(stale) = self.entries.insert(thread, generation) {
            // Re-entry without exit: drop the old binding.
            self.release(stale);
        }
    }

    /// Merged clock for `thread`'s pending exit, retiring its entry.
    ///
    /// Returns `None` if `thread` is not inside the barrier.
    pub fn exit(&mut self, thread: ThreadId) -> Option<VectorClock> {
        let generation = self.entries.remove(&thread)?;
        if generation == self.generation {
            self.generation += 1;
        }
        let merged = self.generations.get(&generation)?.clock.clone();
        self.release(generation);
        Some(merged)
    }

    /// Number of threads currently inside any generation.
    pub fn waiting(&self) -> usize {
        self.entries.len()
    }

    fn release(&mut self, generation: u64) {
        if let Some(slot) = self.generations.get_mut(&generation) {
            slot.inside -= 1;
            if slot.inside == 0 {
                self.generations.remove(&generation);
            }
        }
    }
}
