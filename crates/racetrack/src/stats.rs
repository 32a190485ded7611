//! Per-rule operation counters.
//!
//! Counting is off unless `detector.count_operations` is set; when off every
//! `record` is a single branch. Counters are relaxed atomics: totals are
//! exact once the event stream is quiescent, approximate while it runs.
//!
//! Race counters advance once per access and race kind, however many prior
//! accesses that access conflicts with. Read and write totals count rule
//! transitions only, so an access that races is still counted exactly once.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::report::RaceKind;

/// A counted transition or event class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    ReadSameEpoch,
    ReadSharedSameEpoch,
    ReadExclusive,
    ReadShare,
    ReadShared,
    WriteSameEpoch,
    WriteExclusive,
    WriteShared,
    Acquire,
    Release,
    Fork,
    Join,
    Barrier,
    Wait,
    Volatile,
    Other,
    Sampled,
    Skipped,
}

impl Rule {
    pub const COUNT: usize = 18;

    pub const ALL: [Rule; Rule::COUNT] = [
        Rule::ReadSameEpoch,
        Rule::ReadSharedSameEpoch,
        Rule::ReadExclusive,
        Rule::ReadShare,
        Rule::ReadShared,
        Rule::WriteSameEpoch,
        Rule::WriteExclusive,
        Rule::WriteShared,
        Rule::Acquire,
        Rule::Release,
        Rule::Fork,
        Rule::Join,
        Rule::Barrier,
        Rule::Wait,
        Rule::Volatile,
        Rule::Other,
        Rule::Sampled,
        Rule::Skipped,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rule::ReadSameEpoch => "Read Same Epoch",
            Rule::ReadSharedSameEpoch => "ReadShared Same Epoch",
            Rule::ReadExclusive => "Read Exclusive",
            Rule::ReadShare => "Read Share",
            Rule::ReadShared => "Read Shared",
            Rule::WriteSameEpoch => "Write Same Epoch",
            Rule::WriteExclusive => "Write Exclusive",
            Rule::WriteShared => "Write Shared",
            Rule::Acquire => "Acquire",
            Rule::Release => "Release",
            Rule::Fork => "Fork",
            Rule::Join => "Join",
            Rule::Barrier => "Barrier",
            Rule::Wait => "Wait",
            Rule::Volatile => "Volatile",
            Rule::Other => "Other",
            Rule::Sampled => "Sampled",
            Rule::Skipped => "Skipped",
        }
    }

    fn is_read(self) -> bool {
        matches!(
            self,
            Rule::ReadSameEpoch
                | Rule::ReadSharedSameEpoch
                | Rule::ReadExclusive
                | Rule::ReadShare
                | Rule::ReadShared
        )
    }

    fn is_write(self) -> bool {
        matches!(
            self,
            Rule::WriteSameEpoch | Rule::WriteExclusive | Rule::WriteShared
        )
    }

    fn is_sync(self) -> bool {
        matches!(
            self,
            Rule::Acquire
                | Rule::Release
                | Rule::Fork
                | Rule::Join
                | Rule::Barrier
                | Rule::Wait
                | Rule::Volatile
                | Rule::Other
        )
    }
}

fn race_label(kind: RaceKind) -> &'static str {
    match kind {
        RaceKind::WriteRead => "Write-Read Error",
        RaceKind::WriteWrite => "Write-Write Error",
        RaceKind::ReadWrite => "Read-Write Error",
        RaceKind::SharedWrite => "Shared-Write Error",
    }
}

/// Relaxed counters for every [`Rule`] and [`RaceKind`].
#[derive(Debug)]
pub struct OperationCounters {
    enabled: bool,
    rules: [AtomicU64; Rule::COUNT],
    races: [AtomicU64; 4],
}

impl OperationCounters {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            rules: std::array::from_fn(|_| AtomicU64::new(0)),
            races: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn record(&self, rule: Rule) {
        if self.enabled {
            self.rules[rule as usize].fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_race(&self, kind: RaceKind) {
        if self.enabled {
            self.races[kind as usize].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self, rule: Rule) -> u64 {
        self.rules[rule as usize].load(Ordering::Relaxed)
    }

    pub fn races(&self, kind: RaceKind) -> u64 {
        self.races[kind as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut snapshot = StatsSnapshot {
            enabled: self.enabled,
            ..StatsSnapshot::default()
        };
        for rule in Rule::ALL {
            let count = self.get(rule);
            snapshot.rules.insert(rule.label().to_string(), count);
            if rule.is_read() {
                snapshot.total_reads += count;
            } else if rule.is_write() {
                snapshot.total_writes += count;
            } else if rule.is_sync() {
                snapshot.total_sync += count;
            }
        }
        for kind in RaceKind::ALL {
            snapshot
                .races
                .insert(race_label(kind).to_string(), self.races(kind));
        }
        snapshot.total_accesses = snapshot.total_reads + snapshot.total_writes;
        snapshot.total_ops = snapshot.total_accesses + snapshot.total_sync;
        snapshot
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub enabled: bool,
    pub rules: BTreeMap<String, u64>,
    pub races: BTreeMap<String, u64>,
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_accesses: u64,
    pub total_sync: u64,
    pub total_ops: u64,
}

impl StatsSnapshot {
    pub fn rule(&self, rule: Rule) -> u64 {
        self.rules.get(rule.label()).copied().unwrap_or(0)
    }

    pub fn race(&self, kind: RaceKind) -> u64 {
        self.races.get(race_label(kind)).copied().unwrap_or(0)
    }
}
