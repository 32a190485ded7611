//! Per-location shadow state and the FastTrack read/write rules.
//!
//! `W` and `R` live in atomics so the two same-epoch elision checks can run
//! without the location's lock. Every update happens under the lock, and the
//! slow path re-reads both fields after taking it.
//!
//! # State Machine
//!
//! ```text
//! R = epoch ──(read by an unordered second thread)──> R = READ_SHARED
//!     ^                                                   │
//!     └──────────────── never goes back ──────────────────┘
//! ```
//!
//! Once read-shared, the per-reader epochs live in a slot array sized for
//! every thread id the detector accepts.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use racetrack_types::{Epoch, ThreadId, VectorClock};

use crate::report::{Participant, RaceKind, ShadowSnapshot};
use crate::sampling::{AdaptiveTable, BurstCounter, BurstLayout, ThreadBursts};
use crate::stats::Rule;
use crate::thread::ShadowThread;

/// A conflicting pair found by one rule application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceFinding {
    pub kind: RaceKind,
    pub previous: Participant,
    pub current: Participant,
    pub shadow: ShadowSnapshot,
}

/// Result of applying a read or write rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    /// Transition taken, regardless of races found.
    pub rule: Rule,
    pub races: Vec<RaceFinding>,
}

impl AccessOutcome {
    fn clean(rule: Rule) -> Self {
        Self {
            rule,
            races: Vec::new(),
        }
    }
}

/// Last-read epoch of every reader of a read-shared location.
#[derive(Debug)]
struct SharedReads {
    slots: Box<[AtomicU64]>,
}

impl SharedReads {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len)
                .map(|i| AtomicU64::new(Epoch::zero_for(ThreadId::new(i as u32)).as_raw()))
                .collect(),
        }
    }

    #[inline]
    fn get(&self, tid: ThreadId) -> Epoch {
        self.slots.get(tid.as_usize()).map_or_else(
            || Epoch::zero_for(tid),
            |slot| Epoch::from_raw(slot.load(Ordering::Acquire)),
        )
    }

    fn set(&self, tid: ThreadId, epoch: Epoch) {
        debug_assert!(tid.as_usize() < self.slots.len(), "no reader slot for {tid}");
        if let Some(slot) = self.slots.get(tid.as_usize()) {
            slot.store(epoch.as_raw(), Ordering::Release);
        }
    }

    fn to_clock(&self) -> VectorClock {
        let mut clock = VectorClock::with_len(self.slots.len());
        for i in 0..self.slots.len() {
            let tid = ThreadId::new(i as u32);
            clock.set(tid, self.get(tid));
        }
        clock
    }
}

/// Shadow state of one memory location.
#[derive(Debug)]
pub struct ShadowVar {
    w: AtomicU64,
    r: AtomicU64,
    shared: OnceLock<SharedReads>,
    /// Slow-path lock. Also holds the location-wide burst counter.
    inner: Mutex<Option<BurstCounter>>,
    thread_bursts: Option<ThreadBursts>,
}

impl ShadowVar {
    /// Never-accessed state: `W = R = (T0, 0)`.
    pub fn new(layout: BurstLayout) -> Self {
        let (global, per_thread) = match layout {
            BurstLayout::None => (None, None),
            BurstLayout::Global { burst_length } => (Some(BurstCounter::new(burst_length)), None),
            BurstLayout::PerThread {
                burst_length,
                threads,
            } => (None, Some(ThreadBursts::new(threads, burst_length))),
        };
        Self {
            w: AtomicU64::new(Epoch::ZERO.as_raw()),
            r: AtomicU64::new(Epoch::ZERO.as_raw()),
            shared: OnceLock::new(),
            inner: Mutex::new(global),
            thread_bursts: per_thread,
        }
    }

    #[inline]
    pub fn write_epoch(&self) -> Epoch {
        Epoch::from_raw(self.w.load(Ordering::Acquire))
    }

    #[inline]
    pub fn read_epoch(&self) -> Epoch {
        Epoch::from_raw(self.r.load(Ordering::Acquire))
    }

    pub fn is_read_shared(&self) -> bool {
        self.read_epoch().is_read_shared()
    }

    /// Last-read epoch of `tid` while read-shared.
    pub fn shared_epoch(&self, tid: ThreadId) -> Option<Epoch> {
        self.shared.get().map(|s| s.get(tid))
    }

    pub fn snapshot(&self) -> ShadowSnapshot {
        let read = self.read_epoch();
        ShadowSnapshot {
            write: self.write_epoch(),
            read,
            shared: if read.is_read_shared() {
                self.shared.get().map(SharedReads::to_clock)
            } else {
                None
            },
        }
    }

    /// Applies the read rule for `thread`.
    ///
    /// `reader_slots` is the minimum size of the shared-reader array should
    /// this read promote the location to read-shared.
    pub fn read(&self, thread: &ShadowThread, reader_slots: usize) -> AccessOutcome {
        let tid = thread.tid();
        let e = thread.epoch();

        let r = self.read_epoch();
        if r == e {
            return AccessOutcome::clean(Rule::ReadSameEpoch);
        }
        if r.is_read_shared() && self.shared_epoch(tid) == Some(e) {
            return AccessOutcome::clean(Rule::ReadSharedSameEpoch);
        }

        let _guard = self.inner.lock();
        let clock = thread.clock();
        let r = self.read_epoch();
        let w = self.write_epoch();
        let mut races = Vec::new();

        let w_tid = w.tid();
        if w_tid != tid && !w.leq(clock.get(w_tid)) {
            races.push(self.finding(
                RaceKind::WriteRead,
                Participant::write(w_tid),
                Participant::read(tid),
            ));
        }

        let rule = if r.is_read_shared() {
            if let Some(shared) = self.shared.get() {
                shared.set(tid, e);
            }
            Rule::ReadShared
        } else {
            let r_tid = r.tid();
            if r_tid == tid || r.leq(clock.get(r_tid)) {
                self.r.store(e.as_raw(), Ordering::Release);
                Rule::ReadExclusive
            } else {
                let len = reader_slots
                    .max(r_tid.as_usize() + 1)
                    .max(tid.as_usize() + 1);
                let shared = self.shared.get_or_init(|| SharedReads::new(len));
                shared.set(r_tid, r);
                shared.set(tid, e);
                self.r.store(Epoch::READ_SHARED.as_raw(), Ordering::Release);
                Rule::ReadShare
            }
        };

        AccessOutcome { rule, races }
    }

    /// Applies the write rule for `thread`.
    pub fn write(&self, thread: &ShadowThread) -> AccessOutcome {
        let tid = thread.tid();
        let e = thread.epoch();

        if self.write_epoch() == e {
            return AccessOutcome::clean(Rule::WriteSameEpoch);
        }

        let _guard = self.inner.lock();
        let clock = thread.clock();
        let w = self.write_epoch();
        let r = self.read_epoch();
        let mut races = Vec::new();

        let w_tid = w.tid();
        if w_tid != tid && !w.leq(clock.get(w_tid)) {
            races.push(self.finding(
                RaceKind::WriteWrite,
                Participant::write(w_tid),
                Participant::write(tid),
            ));
        }

        let rule = if r.is_read_shared() {
            if let Some(shared) = self.shared.get() {
                let readers = shared.to_clock();
                for reader in readers.iter_gt(clock) {
                    races.push(self.finding(
                        RaceKind::SharedWrite,
                        Participant::read(reader),
                        Participant::write(tid),
                    ));
                }
            }
            Rule::WriteShared
        } else {
            let r_tid = r.tid();
            if r_tid != tid && !r.leq(clock.get(r_tid)) {
                races.push(self.finding(
                    RaceKind::ReadWrite,
                    Participant::read(r_tid),
                    Participant::write(tid),
                ));
            }
            Rule::WriteExclusive
        };

        self.w.store(e.as_raw(), Ordering::Release);
        AccessOutcome { rule, races }
    }

    /// Consumes one burst slot for `thread` and says whether to check.
    pub fn advance_burst(&self, thread: ThreadId, table: &AdaptiveTable) -> bool {
        if let Some(bursts) = &self.thread_bursts {
            return bursts.advance(thread, table);
        }
        match self.inner.lock().as_mut() {
            Some(counter) => counter.advance(table),
            None => true,
        }
    }

    /// Burst position of the location-wide counter, or of `thread`'s.
    pub fn burst(&self, thread: ThreadId) -> Option<BurstCounter> {
        match &self.thread_bursts {
            Some(bursts) => bursts.get(thread),
            None => *self.inner.lock(),
        }
    }

    fn finding(&self, kind: RaceKind, previous: Participant, current: Participant) -> RaceFinding {
        RaceFinding {
            kind,
            previous,
            current,
            shadow: self.snapshot(),
        }
    }
}
