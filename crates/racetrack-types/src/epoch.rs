//! Epochs: a thread id and a logical clock value packed into one `u64`.
//!
//! **Bit Layout**:
//! - Upper 16 bits: thread id
//! - Lower 48 bits: clock value
//!
//! The all-ones pattern is reserved for [`Epoch::READ_SHARED`]. Thread id
//! `0xFFFF` is therefore never handed out ([`MAX_TID`] is `0xFFFE`), which
//! keeps the sentinel distinct from every encodable epoch.
//!
//! Two epochs are only ordered when they belong to the same thread. The
//! detector never compares raw epochs across threads; it compares an epoch
//! against the component of a vector clock at that epoch's own thread.

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

use crate::ThreadId;

/// Number of bits holding the thread id.
pub const TID_BITS: u32 = 16;

/// Number of bits holding the clock value.
pub const CLOCK_BITS: u32 = 64 - TID_BITS;

/// Largest encodable clock value.
pub const MAX_CLOCK: u64 = (1 << CLOCK_BITS) - 1;

/// Largest thread id that can appear in an epoch.
pub const MAX_TID: u32 = (1 << TID_BITS) - 2;

/// A `(thread id, clock)` pair identifying one tick of one thread's clock.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Epoch(u64);

impl Epoch {
    /// Epoch `(T0, 0)`. Fresh shadow state uses it for "never accessed";
    /// it is `leq` every epoch of thread 0, including the default component
    /// of any vector clock, so it never looks like an unordered access.
    pub const ZERO: Epoch = Epoch(0);

    /// Sentinel stored in a read slot once the location is read-shared.
    pub const READ_SHARED: Epoch = Epoch(u64::MAX);

    /// Encodes a thread id and clock value.
    #[inline]
    pub fn new(tid: ThreadId, clock: u64) -> Self {
        debug_assert!(tid.as_u32() <= MAX_TID, "thread id {tid} exceeds MAX_TID");
        debug_assert!(clock <= MAX_CLOCK, "clock {clock} exceeds MAX_CLOCK");
        Self((u64::from(tid.as_u32()) << CLOCK_BITS) | (clock & MAX_CLOCK))
    }

    /// The epoch at which thread `tid` has not ticked yet.
    #[inline]
    pub fn zero_for(tid: ThreadId) -> Self {
        Self::new(tid, 0)
    }

    /// Rebuilds an epoch from its raw encoding (used with atomics).
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw encoding.
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Extracts the thread id.
    #[inline]
    pub fn tid(self) -> ThreadId {
        ThreadId::new((self.0 >> CLOCK_BITS) as u32)
    }

    /// Extracts the clock value.
    #[inline]
    pub fn clock(self) -> u64 {
        self.0 & MAX_CLOCK
    }

    /// True iff this is the read-shared sentinel.
    #[inline]
    pub fn is_read_shared(self) -> bool {
        self == Self::READ_SHARED
    }

    /// `self ⊑ other`: same thread and a clock no later than `other`'s.
    ///
    /// Returns false across different threads.
    #[inline]
    pub fn leq(self, other: Epoch) -> bool {
        self.tid() == other.tid() && self.clock() <= other.clock()
    }

    /// The next epoch of the same thread.
    ///
    /// Saturates at [`MAX_CLOCK`] rather than carrying into the thread id.
    /// 2^48 ticks of one thread is out of reach of any real run; debug builds
    /// assert it never happens.
    #[inline]
    pub fn next(self) -> Self {
        debug_assert!(self.clock() < MAX_CLOCK, "epoch clock overflow for {self}");
        if self.clock() >= MAX_CLOCK {
            return self;
        }
        Self(self.0 + 1)
    }
}

impl Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_read_shared() {
            write!(f, "SHARED")
        } else {
            write!(f, "({}:{})", self.tid().as_u32(), self.clock())
        }
    }
}

impl Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch{self}")
    }
}
