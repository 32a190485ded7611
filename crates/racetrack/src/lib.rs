//! # racetrack: FastTrack race detection with access sampling
//!
//! Consumes the event stream of an instrumented program (memory accesses and
//! synchronization operations, each tagged with its acting thread) and
//! reports every pair of conflicting accesses that the program's
//! synchronization does not order.
//!
//! # Architecture
//!
//! ```text
//! Event ──> Detector ──> Pipeline [EventTrace?, FastTrack]
//!                             │
//!                             ├── ThreadRegistry   (per-thread clock + epoch)
//!                             ├── SyncState        (lock/volatile/class/barrier clocks)
//!                             ├── Sampler          (check this access at all?)
//!                             └── ShadowVar        (per-location read/write rules)
//!                                      │
//!                                      └──> RaceSink (reports)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use racetrack::{AccessEvent, AccessTarget, CollectingSink, Detector, Event, RaceKind};
//! use racetrack_config::RacetrackConfig;
//! use racetrack_types::{ClassId, FieldId, ObjectId, SiteId, ThreadId};
//!
//! let sink = Arc::new(CollectingSink::new(1));
//! let detector = Detector::new(RacetrackConfig::exhaustive(), sink.clone()).unwrap();
//!
//! let x = AccessTarget::instance_field(ObjectId::new(1), ClassId::new(1), FieldId::new(0));
//! let (t0, t1) = (ThreadId::new(0), ThreadId::new(1));
//! detector.handle(&Event::from(AccessEvent::write(t0, x, SiteId::new(10)))).unwrap();
//! detector.handle(&Event::from(AccessEvent::write(t1, x, SiteId::new(11)))).unwrap();
//!
//! let reports = sink.reports();
//! assert_eq!(reports.len(), 1);
//! assert_eq!(reports[0].kind, RaceKind::WriteWrite);
//! ```

mod context;
mod detector;
mod error;
mod event;
mod fasttrack;
mod handler;
mod report;
pub mod sampling;
mod shadow;
mod stats;
mod sync;
mod thread;

#[cfg(test)]
mod tests;

pub use context::AnalysisContext;
pub use detector::Detector;
pub use error::{DetectorError, SamplingError};
pub use event::{AccessEvent, AccessTarget, Event, Location};
pub use fasttrack::FastTrack;
pub use handler::{EventHandler, EventTrace, Pipeline};
pub use report::{
    CollectingSink, NullSink, Participant, RaceKind, RaceReport, RaceSink, RaceTally, Role,
    ShadowSnapshot, TracingSink,
};
pub use shadow::{AccessOutcome, RaceFinding, ShadowVar};
pub use stats::{OperationCounters, Rule, StatsSnapshot};
pub use sync::{BarrierState, ClockHandle, SyncState};
pub use thread::{ShadowThread, ThreadHandle, ThreadRegistry};
