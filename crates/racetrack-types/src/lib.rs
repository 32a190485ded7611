//! # racetrack-types: Core types for `racetrack`
//!
//! This crate contains the clock algebra and identity types shared across the
//! race detector:
//! - Thread identity ([`ThreadId`])
//! - Compact thread-clock pairs ([`Epoch`])
//! - Causal knowledge summaries ([`VectorClock`])
//! - Identities handed over by the instrumentation engine ([`LockId`],
//!   [`VolatileId`], [`BarrierId`], [`ClassId`], [`ObjectId`], [`FieldId`],
//!   [`SiteId`])
//!
//! Everything here is pure value manipulation with no I/O. The detector calls
//! into these types on every checked access, so the hot operations are small
//! and `#[inline]`.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

mod epoch;
mod vector_clock;

pub use epoch::{CLOCK_BITS, Epoch, MAX_CLOCK, MAX_TID, TID_BITS};
pub use vector_clock::{GreaterIter, VectorClock};

// ============================================================================
// Thread Identity
// ============================================================================

/// Dense small-integer identity of an analyzed thread.
///
/// Ids may be reused once a thread terminates; the detector guards against
/// stale epochs from a previous occupant of the same id (see
/// `ThreadRegistry` in the `racetrack` crate).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ThreadId(u32);

impl ThreadId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the id as a `u32`.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the id as a `usize` for indexing per-thread tables.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl From<u32> for ThreadId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ThreadId> for u32 {
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

// ============================================================================
// Synchronization Object Identities - All Copy (opaque 8-byte values)
// ============================================================================

/// Identity of a monitor/lock object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockId(u64);

impl LockId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

impl From<u64> for LockId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identity of a volatile field instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolatileId(u64);

impl VolatileId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for VolatileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "volatile#{}", self.0)
    }
}

impl From<u64> for VolatileId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identity of a barrier object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BarrierId(u64);

impl BarrierId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for BarrierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "barrier#{}", self.0)
    }
}

impl From<u64> for BarrierId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identity of a class whose static initialization is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(u64);

impl ClassId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

impl From<u64> for ClassId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Memory Location Identities
// ============================================================================

/// Identity of a heap object (field target or array).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identity of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(u32);

impl FieldId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

impl From<u32> for FieldId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Identity of a static access site (one instrumented instruction).
///
/// Race reports are deduplicated by site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(u32);

impl SiteId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "site#{}", self.0)
    }
}

impl From<u32> for SiteId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
