//! The analysis context: every table the detector owns.
//!
//! Created when analysis starts and dropped when it ends. Handlers reach all
//! shared state through it; nothing lives in statics.

use std::sync::Arc;

use dashmap::DashMap;
use racetrack_config::RacetrackConfig;
use racetrack_types::{ObjectId, ThreadId};

use crate::event::Location;
use crate::report::RaceSink;
use crate::sampling::Sampler;
use crate::shadow::ShadowVar;
use crate::stats::OperationCounters;
use crate::sync::SyncState;
use crate::thread::{ThreadHandle, ThreadRegistry};
use crate::DetectorError;

pub struct AnalysisContext {
    config: RacetrackConfig,
    threads: ThreadRegistry,
    sync: SyncState,
    vars: DashMap<Location, Arc<ShadowVar>>,
    sampler: Sampler,
    sink: Arc<dyn RaceSink>,
    counters: OperationCounters,
}

impl AnalysisContext {
    /// Validates `config` and sets up empty tables.
    pub fn new(config: RacetrackConfig, sink: Arc<dyn RaceSink>) -> Result<Self, DetectorError> {
        config.validate()?;
        let sampler = Sampler::new(
            &config.sampling,
            config.detector.max_threads,
            config.detector.seed,
        )?;
        Ok(Self {
            threads: ThreadRegistry::new(config.detector.max_threads),
            sync: SyncState::new(),
            vars: DashMap::new(),
            sampler,
            sink,
            counters: OperationCounters::new(config.detector.count_operations),
            config,
        })
    }

    pub fn config(&self) -> &RacetrackConfig {
        &self.config
    }

    /// State of `tid`, created on first sight.
    pub fn thread(&self, tid: ThreadId) -> Result<ThreadHandle, DetectorError> {
        let (handle, created) = self.threads.ensure(tid)?;
        if created {
            self.sampler.on_thread_created(tid);
        }
        Ok(handle)
    }

    /// State of a thread that must already exist (e.g. a join target).
    pub fn existing_thread(&self, tid: ThreadId) -> Result<ThreadHandle, DetectorError> {
        self.threads.get(tid)
    }

    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    /// Shadow state of `location`, created on first access.
    pub fn shadow_var(&self, location: Location) -> Arc<ShadowVar> {
        if let Some(existing) = self.vars.get(&location) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .vars
            .entry(location)
            .or_insert_with(|| Arc::new(ShadowVar::new(self.sampler.burst_layout())));
        Arc::clone(entry.value())
    }

    /// Drops the shadow state of every location inside `object`, once the
    /// object is unreachable.
    pub fn forget_object(&self, object: ObjectId) {
        self.vars.retain(|location, _| location.object() != Some(object));
    }

    /// Number of locations with shadow state.
    pub fn shadowed_locations(&self) -> usize {
        self.vars.len()
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn sink(&self) -> &dyn RaceSink {
        self.sink.as_ref()
    }

    pub fn counters(&self) -> &OperationCounters {
        &self.counters
    }

    /// Minimum size of a new shared-reader array.
    pub fn reader_slots(&self) -> usize {
        self.config.detector.max_threads as usize
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("threads", &self.threads.len())
            .field("locations", &self.vars.len())
            .field("sampler", &self.sampler)
            .finish_non_exhaustive()
    }
}
