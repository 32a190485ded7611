//! Event handlers and the pipeline that runs them in order.

use tracing::trace;

use crate::context::AnalysisContext;
use crate::event::Event;
use crate::fasttrack::FastTrack;
use crate::DetectorError;

/// One independent observer of the event stream.
pub trait EventHandler: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn handle(&self, ctx: &AnalysisContext, event: &Event) -> Result<(), DetectorError>;
}

/// Ordered list of handlers. Every handler sees every event; the first error
/// stops the event from reaching later handlers.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn EventHandler>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The race checker, optionally preceded by an event trace.
    pub fn standard(trace_events: bool) -> Self {
        let pipeline = Self::new();
        let pipeline = if trace_events {
            pipeline.with_stage(EventTrace)
        } else {
            pipeline
        };
        pipeline.with_stage(FastTrack)
    }

    pub fn with_stage(mut self, stage: impl EventHandler + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn dispatch(&self, ctx: &AnalysisContext, event: &Event) -> Result<(), DetectorError> {
        for stage in &self.stages {
            stage.handle(ctx, event)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

/// Logs every event at `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventTrace;

impl EventHandler for EventTrace {
    fn name(&self) -> &'static str {
        "event-trace"
    }

    fn handle(&self, _ctx: &AnalysisContext, event: &Event) -> Result<(), DetectorError> {
        trace!(thread = %event.thread(), ?event, "event");
        Ok(())
    }
}
