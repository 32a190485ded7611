//! Trace replay command.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use racetrack::{CollectingSink, Detector, Event, Pipeline, RaceReport, RaceTally, StatsSnapshot};
use serde::Serialize;
use tracing::info;

use crate::Format;

/// Flags that change how a replay runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub trace_events: bool,
    pub deny_races: bool,
}

#[derive(Serialize)]
struct PairCount<'a> {
    previous: &'a str,
    current: &'a str,
    count: u64,
}

#[derive(Serialize)]
struct Summary<'a> {
    events: u64,
    races: &'a [RaceReport],
    total_races: u64,
    distinct_pairs: usize,
    pairs: Vec<PairCount<'a>>,
    stats: &'a StatsSnapshot,
}

/// Replays `trace` and prints races, the race tally, and statistics.
pub fn run(trace: &Path, project: Option<&Path>, format: Format, options: Options) -> Result<()> {
    let config = super::load_config(project)?;
    let sink = Arc::new(CollectingSink::new(config.reporting.max_reports_per_site));
    let detector = Detector::with_pipeline(
        config,
        sink.clone(),
        Pipeline::standard(options.trace_events),
    )
    .context("Failed to build detector")?;

    let file =
        File::open(trace).with_context(|| format!("Failed to open trace {}", trace.display()))?;
    let mut events = 0u64;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: Event = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {line_no}"))?;
        detector
            .handle(&event)
            .with_context(|| format!("Event on line {line_no} rejected"))?;
        events += 1;
    }
    info!(events, trace = %trace.display(), "replay finished");

    let reports = sink.reports();
    let mut tally = RaceTally::new();
    tally.extend(&reports);
    let stats = detector.stats();

    match format {
        Format::Json => {
            let summary = Summary {
                events,
                races: &reports,
                total_races: tally.total(),
                distinct_pairs: tally.distinct_unordered(),
                pairs: tally
                    .ordered()
                    .iter()
                    .map(|((previous, current), &count)| PairCount {
                        previous,
                        current,
                        count,
                    })
                    .collect(),
                stats: &stats,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Format::Text => print_text(events, &reports, &tally, &stats),
    }

    if options.deny_races && !reports.is_empty() {
        bail!("{} race(s) reported", reports.len());
    }
    Ok(())
}

fn print_text(events: u64, reports: &[RaceReport], tally: &RaceTally, stats: &StatsSnapshot) {
    for report in reports {
        println!("{report}");
    }
    if !reports.is_empty() {
        println!();
    }

    println!("Replayed {events} events, {} race(s)", reports.len());
    for ((previous, current), count) in tally.ordered() {
        println!("  {count:>6}  {previous} -> {current}");
    }
    println!("Distinct race pairs: {}", tally.distinct_unordered());

    if stats.enabled {
        println!();
        println!("Operations:");
        for (rule, count) in &stats.rules {
            println!("  {rule:<24} {count}");
        }
        for (race, count) in &stats.races {
            println!("  {race:<24} {count}");
        }
        println!("  {:<24} {}", "Total Reads", stats.total_reads);
        println!("  {:<24} {}", "Total Writes", stats.total_writes);
        println!("  {:<24} {}", "Total Access Ops", stats.total_accesses);
        println!("  {:<24} {}", "Total Ops", stats.total_ops);
    }
}
