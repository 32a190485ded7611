//! Shared fixtures for detector integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use racetrack::{AccessEvent, AccessTarget, CollectingSink, Detector, Event, RaceKind, RaceReport};
use racetrack_config::RacetrackConfig;
use racetrack_types::{BarrierId, ClassId, FieldId, LockId, ObjectId, SiteId, ThreadId, VolatileId};

pub fn t(id: u32) -> ThreadId {
    ThreadId::new(id)
}

pub fn x() -> AccessTarget {
    AccessTarget::instance_field(ObjectId::new(100), ClassId::new(1), FieldId::new(0))
}

pub fn y() -> AccessTarget {
    AccessTarget::instance_field(ObjectId::new(100), ClassId::new(1), FieldId::new(1))
}

/// A detector that checks every access, plus the sink it reports to.
pub struct Harness {
    pub detector: Detector,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RacetrackConfig::exhaustive())
    }

    pub fn with_config(mut config: RacetrackConfig) -> Self {
        config.detector.max_threads = 8;
        config.detector.count_operations = true;
        let sink = Arc::new(CollectingSink::new(config.reporting.max_reports_per_site));
        let detector = Detector::new(config, sink.clone()).expect("valid config");
        Self { detector, sink }
    }

    pub fn send(&self, event: Event) {
        self.detector.handle(&event).expect("event accepted");
    }

    pub fn read(&self, thread: u32, target: AccessTarget, site: u32) {
        self.send(AccessEvent::read(t(thread), target, SiteId::new(site)).into());
    }

    pub fn write(&self, thread: u32, target: AccessTarget, site: u32) {
        self.send(AccessEvent::write(t(thread), target, SiteId::new(site)).into());
    }

    pub fn acquire(&self, thread: u32, lock: u64) {
        self.send(Event::Acquire {
            thread: t(thread),
            lock: LockId::new(lock),
        });
    }

    pub fn release(&self, thread: u32, lock: u64) {
        self.send(Event::Release {
            thread: t(thread),
            lock: LockId::new(lock),
        });
    }

    pub fn volatile(&self, thread: u32, volatile: u64, is_write: bool) {
        self.send(Event::VolatileAccess {
            thread: t(thread),
            volatile: VolatileId::new(volatile),
            is_write,
        });
    }

    pub fn fork(&self, parent: u32, child: u32) {
        self.send(Event::ThreadStart {
            thread: t(parent),
            child: t(child),
        });
    }

    pub fn stop(&self, thread: u32) {
        self.send(Event::ThreadStop { thread: t(thread) });
    }

    pub fn join(&self, thread: u32, joined: u32) {
        self.send(Event::Join {
            thread: t(thread),
            joined: t(joined),
        });
    }

    pub fn barrier_enter(&self, thread: u32, barrier: u64) {
        self.send(Event::BarrierEnter {
            thread: t(thread),
            barrier: BarrierId::new(barrier),
        });
    }

    pub fn barrier_exit(&self, thread: u32, barrier: u64) {
        self.send(Event::BarrierExit {
            thread: t(thread),
            barrier: BarrierId::new(barrier),
        });
    }

    pub fn reports(&self) -> Vec<RaceReport> {
        self.sink.reports()
    }

    pub fn kinds(&self) -> Vec<RaceKind> {
        self.reports().iter().map(|r| r.kind).collect()
    }

    pub fn assert_no_races(&self) {
        let reports = self.reports();
        assert!(reports.is_empty(), "unexpected races: {reports:#?}");
    }
}
