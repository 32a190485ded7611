//! Vector clocks for tracking causality (happens-before).
//!
//! Each component holds an [`Epoch`] rather than a bare counter, so that a
//! component can be compared directly against an epoch recorded in shadow
//! state. Component `t` always carries thread id `t`; an unseen component
//! reads as `(t, 0)`.
//!
//! # Example
//!
//! ```text
//! T0: [(0:5), (1:2), (2:3)]   T0 is at tick 5, last saw T1 at 2 and T2 at 3
//! T1: [(0:4), (1:7), (2:3)]   T1 is at tick 7, last saw T0 at 4 and T2 at 3
//! ```
//!
//! Storage grows on demand when a higher thread id shows up. Growth fills the
//! new slots with zero epochs and never disturbs stored components.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Epoch, ThreadId};

/// Vector clock keyed by dense thread id.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    entries: Vec<Epoch>,
}

impl VectorClock {
    /// Creates an empty clock (every component reads as zero).
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates a clock with storage preallocated for `len` threads.
    pub fn with_len(len: usize) -> Self {
        let mut clock = Self::new();
        clock.ensure_len(len);
        clock
    }

    /// Number of components currently backed by storage.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no component has storage yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Component for `tid`, `(tid, 0)` if never set.
    #[inline]
    pub fn get(&self, tid: ThreadId) -> Epoch {
        self.entries
            .get(tid.as_usize())
            .copied()
            .unwrap_or_else(|| Epoch::zero_for(tid))
    }

    /// Overwrites the component for `tid`.
    #[inline]
    pub fn set(&mut self, tid: ThreadId, epoch: Epoch) {
        debug_assert_eq!(epoch.tid(), tid, "component {tid} given epoch {epoch}");
        self.ensure_len(tid.as_usize() + 1);
        self.entries[tid.as_usize()] = epoch;
    }

    /// Increments the component for `tid` by one and returns the new value.
    #[inline]
    pub fn tick(&mut self, tid: ThreadId) -> Epoch {
        let next = self.get(tid).next();
        self.set(tid, next);
        next
    }

    /// Pointwise maximum with `other`, in place.
    pub fn max(&mut self, other: &VectorClock) {
        self.ensure_len(other.len());
        for (mine, theirs) in self.entries.iter_mut().zip(other.entries.iter()) {
            // Same index means same thread id, so raw order is clock order.
            if theirs.as_raw() > mine.as_raw() {
                *mine = *theirs;
            }
        }
    }

    /// Makes this clock an exact copy of `other`.
    pub fn copy_from(&mut self, other: &VectorClock) {
        self.entries.clear();
        self.entries.extend_from_slice(&other.entries);
    }

    /// Pointwise `self ≤ other` over every component.
    pub fn leq(&self, other: &VectorClock) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.clock() <= other.get(ThreadId::new(i as u32)).clock())
    }

    /// True iff some component of `self` exceeds the matching one in `other`.
    pub fn any_gt(&self, other: &VectorClock) -> bool {
        self.next_gt(other, 0).is_some()
    }

    /// Smallest thread id `>= from` whose component exceeds `other`'s.
    pub fn next_gt(&self, other: &VectorClock, from: usize) -> Option<ThreadId> {
        (from..self.entries.len())
            .map(|i| ThreadId::new(i as u32))
            .find(|&tid| self.get(tid).clock() > other.get(tid).clock())
    }

    /// Lazily enumerates, in ascending order, every thread id whose
    /// component exceeds `other`'s.
    pub fn iter_gt<'a>(&'a self, other: &'a VectorClock) -> GreaterIter<'a> {
        GreaterIter {
            this: self,
            other,
            next: 0,
        }
    }

    /// Iterates over stored components.
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, Epoch)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (ThreadId::new(i as u32), *e))
    }

    fn ensure_len(&mut self, len: usize) {
        let current = self.entries.len();
        if len > current {
            self.entries.reserve(len - current);
            for i in current..len {
                self.entries.push(Epoch::zero_for(ThreadId::new(i as u32)));
            }
        }
    }
}

impl fmt::Debug for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VC{self}")
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, "]")
    }
}

/// Iterator returned by [`VectorClock::iter_gt`].
pub struct GreaterIter<'a> {
    this: &'a VectorClock,
    other: &'a VectorClock,
    next: usize,
}

impl Iterator for GreaterIter<'_> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<Self::Item> {
        let found = self.this.next_gt(self.other, self.next)?;
        self.next = found.as_usize() + 1;
        Some(found)
    }
}
