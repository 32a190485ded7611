//! Public entry point: an analysis context driven by a handler pipeline.

use std::sync::Arc;

use racetrack_config::RacetrackConfig;
use racetrack_types::{ObjectId, ThreadId};
use tracing::info;

use crate::context::AnalysisContext;
use crate::event::Event;
use crate::handler::Pipeline;
use crate::report::RaceSink;
use crate::stats::StatsSnapshot;
use crate::DetectorError;

/// A running race detector.
///
/// `handle` may be called from many OS threads at once, each delivering its
/// own thread's events in program order.
#[derive(Debug)]
pub struct Detector {
    ctx: AnalysisContext,
    pipeline: Pipeline,
}

impl Detector {
    /// Builds a detector running the standard pipeline.
    ///
    /// Fails on an invalid configuration, before any event is processed.
    pub fn new(config: RacetrackConfig, sink: Arc<dyn RaceSink>) -> Result<Self, DetectorError> {
        Self::with_pipeline(config, sink, Pipeline::standard(false))
    }

    pub fn with_pipeline(
        config: RacetrackConfig,
        sink: Arc<dyn RaceSink>,
        pipeline: Pipeline,
    ) -> Result<Self, DetectorError> {
        let ctx = AnalysisContext::new(config, sink)?;
        info!(
            max_threads = ctx.config().detector.max_threads,
            scheme = ?ctx.config().sampling.scheme,
            exhaustive = ctx.sampler().is_exhaustive(),
            stages = ?pipeline.stage_names(),
            "detector ready"
        );
        Ok(Self { ctx, pipeline })
    }

    /// Processes one event.
    pub fn handle(&self, event: &Event) -> Result<(), DetectorError> {
        self.pipeline.dispatch(&self.ctx, event)
    }

    /// Drops shadow state of an object that became unreachable.
    pub fn forget_object(&self, object: ObjectId) {
        self.ctx.forget_object(object);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.counters().snapshot()
    }

    /// `[tid=.. C=.. E=..]` for a known thread.
    pub fn describe_thread(&self, tid: ThreadId) -> Option<String> {
        let handle = self.ctx.existing_thread(tid).ok()?;
        let thread = handle.lock();
        Some(thread.to_string())
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.ctx
    }
}
