//! Error types for the detector.
//!
//! Races are not errors. They are [`RaceReport`](crate::RaceReport) values
//! delivered to a sink. The errors here describe a misconfigured detector or
//! an event stream that breaks the instrumentation protocol.

use racetrack_types::{BarrierId, ThreadId};

/// Fatal sampling misconfiguration, raised before any event is processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    #[error("sampling rate {0} is outside 0..=100")]
    RateOutOfRange(u32),

    #[error("adaptive burst length must be at least 1")]
    ZeroBurstLength,

    #[error("adaptive floor {min} exceeds burst length {burst}, leaving no sampling levels")]
    FloorAboveBurst { min: u32, burst: u32 },

    #[error("adaptive decay rate must be at least 1")]
    ZeroDecayRate,

    #[error("geometric decay by {0} never reaches the floor")]
    NonTerminatingDecay(u32),
}

/// Errors returned while handling an event.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("thread id {thread} is not below max_threads ({max_threads})")]
    ThreadIdOutOfRange { thread: ThreadId, max_threads: u32 },

    #[error("no shadow state for thread {0}")]
    UnknownThread(ThreadId),

    #[error("thread {0} cannot start or join itself")]
    SelfEdge(ThreadId),

    #[error("thread {thread} exited {barrier} without entering it")]
    BarrierExitWithoutEntry {
        thread: ThreadId,
        barrier: BarrierId,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

impl From<racetrack_config::ConfigError> for DetectorError {
    fn from(err: racetrack_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
