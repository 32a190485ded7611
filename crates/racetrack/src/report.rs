//! Race reports and the sinks that receive them.
//!
//! The detector asks [`RaceSink::still_looking`] before building a report
//! and keeps applying the shadow rules whatever the answer. Deduplication is
//! the sink's business.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use dashmap::DashMap;
use parking_lot::Mutex;
use racetrack_types::{Epoch, SiteId, ThreadId, VectorClock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::Location;

// ============================================================================
// Report Values
// ============================================================================

/// Which prior access conflicts with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaceKind {
    WriteRead,
    WriteWrite,
    ReadWrite,
    SharedWrite,
}

impl RaceKind {
    pub const ALL: [RaceKind; 4] = [
        RaceKind::WriteRead,
        RaceKind::WriteWrite,
        RaceKind::ReadWrite,
        RaceKind::SharedWrite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RaceKind::WriteRead => "Write-Read Race",
            RaceKind::WriteWrite => "Write-Write Race",
            RaceKind::ReadWrite => "Read-Write Race",
            RaceKind::SharedWrite => "Read(Shared)-Write Race",
        }
    }
}

impl Display for RaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Read,
    Write,
}

/// One side of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Participant {
    pub role: Role,
    pub thread: ThreadId,
}

impl Participant {
    pub fn read(thread: ThreadId) -> Self {
        Self {
            role: Role::Read,
            thread,
        }
    }

    pub fn write(thread: ThreadId) -> Self {
        Self {
            role: Role::Write,
            thread,
        }
    }
}

impl Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Read => write!(f, "Read by {}", self.thread),
            Role::Write => write!(f, "Write by {}", self.thread),
        }
    }
}

/// Shadow state of a location at the moment a race was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowSnapshot {
    pub write: Epoch,
    pub read: Epoch,
    /// Per-reader epochs, present once the location is read-shared.
    pub shared: Option<VectorClock>,
}

impl Display for ShadowSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[W={} R={}", self.write, self.read)?;
        if let Some(shared) = &self.shared {
            write!(f, " V={shared}")?;
        }
        write!(f, "]")
    }
}

/// A detected race, as handed to a [`RaceSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceReport {
    pub kind: RaceKind,
    pub site: SiteId,
    pub location: Location,
    pub previous: Participant,
    pub current: Participant,
    pub shadow: ShadowSnapshot,
    /// Clock of the current thread when the race was found.
    pub thread_clock: VectorClock,
}

impl Display for RaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} on {}: {} / {} shadow {} clock {}",
            self.kind,
            self.site,
            self.location,
            self.previous,
            self.current,
            self.shadow,
            self.thread_clock
        )
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Receiver of race reports.
pub trait RaceSink: Send + Sync {
    /// Whether reports for `site` are still wanted.
    fn still_looking(&self, site: SiteId) -> bool;

    fn report(&self, report: RaceReport);
}

/// Per-site report budget shared by the bundled sinks.
#[derive(Debug)]
struct SiteBudget {
    max_per_site: u32,
    seen: DashMap<SiteId, u32>,
}

impl SiteBudget {
    fn new(max_per_site: u32) -> Self {
        Self {
            max_per_site,
            seen: DashMap::new(),
        }
    }

    fn has_room(&self, site: SiteId) -> bool {
        self.seen
            .get(&site)
            .is_none_or(|count| *count < self.max_per_site)
    }

    /// Charges one report against `site`; false if the budget was spent.
    fn charge(&self, site: SiteId) -> bool {
        let mut count = self.seen.entry(site).or_insert(0);
        if *count >= self.max_per_site {
            return false;
        }
        *count += 1;
        true
    }
}

/// Keeps reports in memory, at most `max_per_site` per site.
#[derive(Debug)]
pub struct CollectingSink {
    budget: SiteBudget,
    reports: Mutex<Vec<RaceReport>>,
}

impl CollectingSink {
    pub fn new(max_per_site: u32) -> Self {
        Self {
            budget: SiteBudget::new(max_per_site),
            reports: Mutex::new(Vec::new()),
        }
    }

    /// Copy of every report kept so far, in arrival order.
    pub fn reports(&self) -> Vec<RaceReport> {
        self.reports.lock().clone()
    }

    /// Removes and returns every report kept so far.
    pub fn drain(&self) -> Vec<RaceReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl RaceSink for CollectingSink {
    fn still_looking(&self, site: SiteId) -> bool {
        self.budget.has_room(site)
    }

    fn report(&self, report: RaceReport) {
        if self.budget.charge(report.site) {
            self.reports.lock().push(report);
        }
    }
}

/// Logs each report at `warn`, at most `max_per_site` per site.
#[derive(Debug)]
pub struct TracingSink {
    budget: SiteBudget,
}

impl TracingSink {
    pub fn new(max_per_site: u32) -> Self {
        Self {
            budget: SiteBudget::new(max_per_site),
        }
    }
}

impl RaceSink for TracingSink {
    fn still_looking(&self, site: SiteId) -> bool {
        self.budget.has_room(site)
    }

    fn report(&self, report: RaceReport) {
        if self.budget.charge(report.site) {
            warn!(
                kind = %report.kind,
                site = %report.site,
                location = %report.location,
                previous = %report.previous,
                current = %report.current,
                shadow = %report.shadow,
                "data race"
            );
        }
    }
}

/// Discards everything and never asks for reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RaceSink for NullSink {
    fn still_looking(&self, _site: SiteId) -> bool {
        false
    }

    fn report(&self, _report: RaceReport) {}
}

// ============================================================================
// Tally
// ============================================================================

/// Counts races per (previous, current) description pair.
///
/// Both halves name the reporting site, so a pair seen from either side
/// collapses into one unordered race.
#[derive(Debug, Default, Clone)]
pub struct RaceTally {
    pairs: BTreeMap<(String, String), u64>,
}

impl RaceTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &RaceReport) {
        let key = (
            format!("{} at {}", report.previous, report.site),
            format!("{} at {}", report.current, report.site),
        );
        *self.pairs.entry(key).or_insert(0) += 1;
    }

    /// Occurrences of each ordered pair.
    pub fn ordered(&self) -> &BTreeMap<(String, String), u64> {
        &self.pairs
    }

    /// Total number of reports recorded.
    pub fn total(&self) -> u64 {
        self.pairs.values().sum()
    }

    /// Number of distinct pairs once `(a, b)` and `(b, a)` are merged.
    pub fn distinct_unordered(&self) -> usize {
        let mut seen = std::collections::BTreeSet::new();
        for (a, b) in self.pairs.keys() {
            let key = if a <= b { (a, b) } else { (b, a) };
            seen.insert(key);
        }
        seen.len()
    }
}

impl<'a> Extend<&'a RaceReport> for RaceTally {
    fn extend<I: IntoIterator<Item = &'a RaceReport>>(&mut self, iter: I) {
        for report in iter {
            self.record(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetrack_types::{FieldId, ObjectId};

    fn report(site: u32, previous: Participant, current: Participant) -> RaceReport {
        RaceReport {
            kind: RaceKind::WriteWrite,
            site: SiteId::new(site),
            location: Location::InstanceField {
                object: ObjectId::new(1),
                field: FieldId::new(0),
            },
            previous,
            current,
            shadow: ShadowSnapshot {
                write: Epoch::new(ThreadId::new(0), 3),
                read: Epoch::ZERO,
                shared: None,
            },
            thread_clock: VectorClock::new(),
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(RaceKind::SharedWrite.to_string(), "Read(Shared)-Write Race");
        assert_eq!(RaceKind::WriteRead.to_string(), "Write-Read Race");
    }

    #[test]
    fn participant_labels() {
        assert_eq!(Participant::write(ThreadId::new(1)).to_string(), "Write by T1");
        assert_eq!(Participant::read(ThreadId::new(2)).to_string(), "Read by T2");
    }

    #[test]
    fn collecting_sink_honors_site_budget() {
        let sink = CollectingSink::new(2);
        let r = report(7, Participant::write(ThreadId::new(0)), Participant::write(ThreadId::new(1)));

        assert!(sink.still_looking(SiteId::new(7)));
        sink.report(r.clone());
        sink.report(r.clone());
        assert!(!sink.still_looking(SiteId::new(7)));
        sink.report(r);
        assert_eq!(sink.len(), 2);
        assert!(sink.still_looking(SiteId::new(8)));

        assert_eq!(sink.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn null_sink_is_never_interested() {
        assert!(!NullSink.still_looking(SiteId::new(0)));
    }

    #[test]
    fn snapshot_display() {
        let snap = ShadowSnapshot {
            write: Epoch::new(ThreadId::new(1), 4),
            read: Epoch::READ_SHARED,
            shared: Some(VectorClock::new()),
        };
        assert_eq!(snap.to_string(), "[W=(1:4) R=SHARED V=[]]");
    }

    #[test]
    fn tally_counts_ordered_pairs() {
        let t0 = ThreadId::new(0);
        let t1 = ThreadId::new(1);
        let mut tally = RaceTally::new();
        let a = report(1, Participant::write(t0), Participant::write(t1));
        tally.extend([&a, &a]);
        tally.record(&report(2, Participant::read(t1), Participant::write(t0)));

        assert_eq!(tally.total(), 3);
        assert_eq!(tally.ordered().len(), 2);
        assert_eq!(
            tally.ordered()[&(
                "Write by T0 at site#1".to_string(),
                "Write by T1 at site#1".to_string()
            )],
            2
        );
        assert_eq!(tally.distinct_unordered(), 2);
    }

    #[test]
    fn tally_merges_reversed_pair_at_one_site() {
        let t0 = ThreadId::new(0);
        let t1 = ThreadId::new(1);
        let mut tally = RaceTally::new();
        tally.record(&report(1, Participant::write(t0), Participant::write(t1)));
        tally.record(&report(1, Participant::write(t1), Participant::write(t0)));

        assert_eq!(tally.ordered().len(), 2);
        assert_eq!(tally.distinct_unordered(), 1);
    }

    #[test]
    fn tally_keeps_reversed_pair_at_other_site_apart() {
        let t0 = ThreadId::new(0);
        let t1 = ThreadId::new(1);
        let mut tally = RaceTally::new();
        tally.record(&report(1, Participant::write(t0), Participant::write(t1)));
        tally.record(&report(2, Participant::write(t1), Participant::write(t0)));

        assert_eq!(tally.distinct_unordered(), 2);
    }

    #[test]
    fn tracing_sink_honors_site_budget() {
        let sink = TracingSink::new(1);
        let r = report(4, Participant::read(ThreadId::new(2)), Participant::write(ThreadId::new(3)));

        assert!(sink.still_looking(SiteId::new(4)));
        sink.report(r.clone());
        assert!(!sink.still_looking(SiteId::new(4)));
        sink.report(r);
        assert!(!sink.still_looking(SiteId::new(4)));
        assert!(sink.still_looking(SiteId::new(5)));
    }
}
