//! Per-thread clock state and the registry that hands it out.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use racetrack_types::{Epoch, MAX_TID, ThreadId, VectorClock};
use tracing::debug;

use crate::DetectorError;

/// Clock state of one analyzed thread.
///
/// Invariant: `epoch == clock.get(tid)` after every public method.
#[derive(Debug, Clone)]
pub struct ShadowThread {
    tid: ThreadId,
    clock: VectorClock,
    epoch: Epoch,
    stopped: bool,
}

impl ShadowThread {
    fn new(tid: ThreadId, seed: Epoch) -> Self {
        let mut clock = VectorClock::new();
        clock.set(tid, seed);
        let mut thread = Self {
            tid,
            clock,
            epoch: seed,
            stopped: false,
        };
        thread.inc_epoch_and_cv();
        thread
    }

    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    /// Current epoch (`clock[tid]`).
    #[inline]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[inline]
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Receives ordering from `other` without producing a new sync point.
    pub fn max_epoch_and_cv(&mut self, other: &VectorClock) {
        self.clock.max(other);
        self.epoch = self.clock.get(self.tid);
    }

    /// Produces a new synchronization point.
    pub fn inc_epoch_and_cv(&mut self) {
        self.epoch = self.clock.tick(self.tid);
    }

    /// Inherits `other`, then ticks.
    pub fn max_and_inc_epoch_and_cv(&mut self, other: &VectorClock) {
        self.clock.max(other);
        self.inc_epoch_and_cv();
    }
}

impl std::fmt::Display for ShadowThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[tid={} C={} E={}]", self.tid, self.clock, self.epoch)
    }
}

/// Shared handle to one thread's state.
pub type ThreadHandle = Arc<Mutex<ShadowThread>>;

/// Owns every [`ShadowThread`] plus the table of the largest epoch ever
/// assigned per thread id.
///
/// A reused id starts strictly after its previous occupant's final epoch, so
/// clocks that saw the old occupant never mistake the newcomer's accesses for
/// ordered ones.
#[derive(Debug)]
pub struct ThreadRegistry {
    max_threads: u32,
    threads: DashMap<ThreadId, ThreadHandle>,
    max_epoch_per_tid: Mutex<VectorClock>,
}

impl ThreadRegistry {
    pub fn new(max_threads: u32) -> Self {
        Self {
            max_threads,
            threads: DashMap::new(),
            max_epoch_per_tid: Mutex::new(VectorClock::new()),
        }
    }

    pub fn max_threads(&self) -> u32 {
        self.max_threads
    }

    /// State of `tid`, creating it on first sight or after the previous
    /// occupant stopped. The flag is true when a new state was installed.
    pub fn ensure(&self, tid: ThreadId) -> Result<(ThreadHandle, bool), DetectorError> {
        self.check_range(tid)?;

        if let Some(existing) = self.threads.get(&tid) {
            if !existing.lock().is_stopped() {
                return Ok((Arc::clone(existing.value()), false));
            }
        }

        // Slow path: the entry guard serializes concurrent creators of one id.
        let mut inserted = false;
        let entry = self.threads.entry(tid).or_insert_with(|| {
            inserted = true;
            self.fresh(tid)
        });
        let handle = Arc::clone(entry.value());
        let created = {
            let mut current = handle.lock();
            if current.is_stopped() {
                *current = self.seed_state(tid);
                true
            } else {
                inserted
            }
        };
        drop(entry);

        if created {
            debug!(thread = %tid, epoch = %handle.lock().epoch(), "thread created");
        }
        Ok((handle, created))
    }

    /// State of an already created thread (running or stopped).
    pub fn get(&self, tid: ThreadId) -> Result<ThreadHandle, DetectorError> {
        self.check_range(tid)?;
        self.threads
            .get(&tid)
            .map(|h| Arc::clone(h.value()))
            .ok_or(DetectorError::UnknownThread(tid))
    }

    /// Records the final epoch of `tid` and marks it stopped.
    pub fn stop(&self, tid: ThreadId) -> Result<(), DetectorError> {
        let handle = self.get(tid)?;
        let mut thread = handle.lock();
        let epoch = thread.epoch();
        thread.stopped = true;
        self.max_epoch_per_tid.lock().set(tid, epoch);
        debug!(thread = %tid, %epoch, "thread stopped");
        Ok(())
    }

    /// Number of thread states held (including stopped ones).
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    fn check_range(&self, tid: ThreadId) -> Result<(), DetectorError> {
        if tid.as_u32() >= self.max_threads || tid.as_u32() > MAX_TID {
            return Err(DetectorError::ThreadIdOutOfRange {
                thread: tid,
                max_threads: self.max_threads,
            });
        }
        Ok(())
    }

    fn seed_clock(&self, tid: ThreadId) -> u64 {
        self.max_epoch_per_tid.lock().get(tid).clock() + 1
    }

    fn seed_state(&self, tid: ThreadId) -> ShadowThread {
        ShadowThread::new(tid, Epoch::new(tid, self.seed_clock(tid)))
    }

    fn fresh(&self, tid: ThreadId) -> ThreadHandle {
        Arc::new(Mutex::new(self.seed_state(tid)))
    }
}
