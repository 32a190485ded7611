//! Unit tests for the sampling engine and detector plumbing.

use std::sync::Arc;

use proptest::prelude::*;
use racetrack_config::{
    BurstGranularity, CountMode, DecayKind, RacetrackConfig, SamplingConfig, SamplingScheme,
};
use racetrack_types::{ClassId, FieldId, LockId, ObjectId, SiteId, ThreadId};

use crate::sampling::{BurstLayout, Sampler};
use crate::*;

fn count_config(mode: CountMode, rate: u32) -> SamplingConfig {
    let mut config = SamplingConfig::default();
    config.count.mode = mode;
    config.count.rate = rate;
    config
}

fn checked_in(sampler: &Sampler, thread: ThreadId, var: &ShadowVar, n: usize) -> usize {
    (0..n).filter(|_| sampler.should_check(thread, var)).count()
}

// ============================================================================
// Count Sampling
// ============================================================================

#[test]
fn uniform_rate_hundred_checks_everything() {
    let sampler = Sampler::new(&count_config(CountMode::Uniform, 100), 4, None).unwrap();
    let var = ShadowVar::new(sampler.burst_layout());
    assert!(sampler.is_exhaustive());
    assert_eq!(checked_in(&sampler, ThreadId::new(0), &var, 1000), 1000);
}

#[test]
fn uniform_rate_zero_checks_nothing() {
    let sampler = Sampler::new(&count_config(CountMode::Uniform, 0), 4, None).unwrap();
    let var = ShadowVar::new(sampler.burst_layout());
    assert_eq!(checked_in(&sampler, ThreadId::new(0), &var, 1000), 0);
}

#[test]
fn uniform_partial_rate_is_roughly_honored() {
    let sampler = Sampler::new(&count_config(CountMode::Uniform, 50), 4, Some(11)).unwrap();
    let var = ShadowVar::new(sampler.burst_layout());
    let checked = checked_in(&sampler, ThreadId::new(0), &var, 10_000);
    assert!((4_000..6_000).contains(&checked), "checked {checked}");
}

#[test]
fn rate_above_hundred_is_fatal() {
    let err = Sampler::new(&count_config(CountMode::Uniform, 101), 4, None).unwrap_err();
    assert_eq!(err, SamplingError::RateOutOfRange(101));
}

#[test]
fn global_permutation_windows_repeat_exactly() {
    let sampler =
        Sampler::new(&count_config(CountMode::GlobalPermutation, 30), 4, Some(5)).unwrap();
    let var = ShadowVar::new(BurstLayout::None);

    // Threads interleave on one shared sequence.
    let first: Vec<bool> = (0..100)
        .map(|i| sampler.should_check(ThreadId::new(i % 3), &var))
        .collect();
    let second: Vec<bool> = (0..100)
        .map(|_| sampler.should_check(ThreadId::new(1), &var))
        .collect();

    assert_eq!(first.iter().filter(|&&b| b).count(), 30);
    assert_eq!(first, second);
}

#[test]
fn per_thread_permutations_are_independent() {
    let sampler =
        Sampler::new(&count_config(CountMode::PerThreadPermutation, 40), 4, Some(8)).unwrap();
    let var = ShadowVar::new(BurstLayout::None);
    sampler.on_thread_created(ThreadId::new(0));
    sampler.on_thread_created(ThreadId::new(1));

    // T0 consumes half of its window; T1's window is untouched by that.
    let t0_first_half = checked_in(&sampler, ThreadId::new(0), &var, 50);
    assert_eq!(checked_in(&sampler, ThreadId::new(1), &var, 100), 40);
    let t0_second_half = checked_in(&sampler, ThreadId::new(0), &var, 50);
    assert_eq!(t0_first_half + t0_second_half, 40);
}

#[test]
fn per_thread_permutation_created_lazily_for_unannounced_threads() {
    let sampler =
        Sampler::new(&count_config(CountMode::PerThreadPermutation, 10), 4, Some(8)).unwrap();
    let var = ShadowVar::new(BurstLayout::None);
    assert_eq!(checked_in(&sampler, ThreadId::new(3), &var, 100), 10);
}

// ============================================================================
// Adaptive Sampling
// ============================================================================

fn adaptive_config(granularity: BurstGranularity) -> SamplingConfig {
    let mut config = SamplingConfig {
        scheme: SamplingScheme::Adaptive,
        ..SamplingConfig::default()
    };
    config.adaptive.burst_length = 10;
    config.adaptive.min_sampling = 2;
    config.adaptive.decay_rate = 4;
    config.adaptive.decay = DecayKind::Linear;
    config.adaptive.granularity = granularity;
    config
}

#[test]
fn adaptive_per_thread_levels_advance_per_window() {
    let sampler = Sampler::new(&adaptive_config(BurstGranularity::PerThread), 4, Some(1)).unwrap();
    let layout = sampler.burst_layout();
    assert_eq!(
        layout,
        BurstLayout::PerThread {
            burst_length: 10,
            threads: 4
        }
    );
    let var = ShadowVar::new(layout);
    let t0 = ThreadId::new(0);

    // Levels: 10, 6, 2 checked slots per window.
    let windows: Vec<usize> = (0..4).map(|_| checked_in(&sampler, t0, &var, 10)).collect();
    assert_eq!(windows, vec![10, 6, 2, 2]);
    assert_eq!(var.burst(t0).unwrap().level(), 2);
    assert_eq!(var.burst(ThreadId::new(1)).unwrap().level(), 0);
}

#[test]
fn adaptive_global_shares_one_counter_per_location() {
    let sampler = Sampler::new(&adaptive_config(BurstGranularity::Global), 4, Some(1)).unwrap();
    let var = ShadowVar::new(sampler.burst_layout());

    for i in 0..10 {
        sampler.should_check(ThreadId::new(i % 2), &var);
    }
    assert_eq!(var.burst(ThreadId::new(0)).unwrap().level(), 1);
    assert_eq!(var.burst(ThreadId::new(1)).unwrap().level(), 1);

    let other = ShadowVar::new(sampler.burst_layout());
    assert_eq!(other.burst(ThreadId::new(0)).unwrap().level(), 0);
}

#[test]
fn adaptive_misconfiguration_is_fatal() {
    let mut config = adaptive_config(BurstGranularity::Global);
    config.adaptive.decay = DecayKind::Geometric;
    config.adaptive.decay_rate = 1;
    assert_eq!(
        Sampler::new(&config, 4, None).unwrap_err(),
        SamplingError::NonTerminatingDecay(1)
    );
}

proptest! {
    /// Property: every 100-access window of a global permutation checks exactly `rate` accesses
    #[test]
    fn prop_global_permutation_window_count(rate in 0u32..=100, seed in any::<u64>()) {
        let sampler = Sampler::new(
            &count_config(CountMode::GlobalPermutation, rate),
            2,
            Some(seed),
        ).unwrap();
        let var = ShadowVar::new(BurstLayout::None);
        for _ in 0..3 {
            prop_assert_eq!(checked_in(&sampler, ThreadId::new(0), &var, 100), rate as usize);
        }
    }

    /// Property: adaptive density never increases from one window to the next
    #[test]
    fn prop_adaptive_density_non_increasing(
        burst in 1u32..40,
        min_frac in 0u32..=100,
        decay in 1u32..10,
        seed in any::<u64>(),
    ) {
        let mut config = adaptive_config(BurstGranularity::Global);
        config.adaptive.burst_length = burst;
        config.adaptive.min_sampling = burst * min_frac / 100;
        config.adaptive.decay_rate = decay;
        let sampler = Sampler::new(&config, 2, Some(seed)).unwrap();
        let var = ShadowVar::new(sampler.burst_layout());

        let windows: Vec<usize> = (0..6)
            .map(|_| checked_in(&sampler, ThreadId::new(0), &var, burst as usize))
            .collect();
        prop_assert_eq!(windows[0], burst as usize);
        for pair in windows.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }
}

// ============================================================================
// Detector Plumbing
// ============================================================================

fn counting_detector() -> (Detector, Arc<CollectingSink>) {
    let mut config = RacetrackConfig::exhaustive();
    config.detector.max_threads = 4;
    config.detector.count_operations = true;
    let sink = Arc::new(CollectingSink::new(1));
    let detector = Detector::new(config, sink.clone()).unwrap();
    (detector, sink)
}

fn field() -> AccessTarget {
    AccessTarget::instance_field(ObjectId::new(1), ClassId::new(1), FieldId::new(0))
}

#[test]
fn stats_count_rules_and_races() {
    let (detector, _sink) = counting_detector();
    let t0 = ThreadId::new(0);
    let t1 = ThreadId::new(1);

    detector.handle(&AccessEvent::write(t0, field(), SiteId::new(1)).into()).unwrap();
    detector.handle(&AccessEvent::write(t0, field(), SiteId::new(1)).into()).unwrap();
    detector.handle(&Event::Release { thread: t0, lock: LockId::new(1) }).unwrap();
    detector.handle(&AccessEvent::read(t1, field(), SiteId::new(2)).into()).unwrap();

    let stats = detector.stats();
    assert!(stats.enabled);
    assert_eq!(stats.rule(Rule::WriteExclusive), 1);
    assert_eq!(stats.rule(Rule::WriteSameEpoch), 1);
    assert_eq!(stats.rule(Rule::ReadExclusive), 1);
    assert_eq!(stats.rule(Rule::Release), 1);
    assert_eq!(stats.rule(Rule::Sampled), 3);
    assert_eq!(stats.race(RaceKind::WriteRead), 1);
    assert_eq!(stats.total_accesses, 3);
}

#[test]
fn sink_gate_suppresses_reports_but_not_rules() {
    let (detector, sink) = counting_detector();
    for t in 0..3 {
        detector
            .handle(&AccessEvent::write(ThreadId::new(t), field(), SiteId::new(9)).into())
            .unwrap();
    }
    assert_eq!(sink.len(), 1);
    assert_eq!(detector.stats().race(RaceKind::WriteWrite), 2);
    let state = detector.context().shadow_var(field().location());
    assert_eq!(state.write_epoch().tid(), ThreadId::new(2));
}

#[test]
fn thread_beyond_max_threads_is_rejected() {
    let (detector, _sink) = counting_detector();
    let err = detector
        .handle(&AccessEvent::read(ThreadId::new(4), field(), SiteId::new(1)).into())
        .unwrap_err();
    assert!(matches!(err, DetectorError::ThreadIdOutOfRange { .. }));
}

#[test]
fn invalid_config_fails_before_any_event() {
    let mut config = RacetrackConfig::adaptive(10, 20, 1);
    config.detector.max_threads = 4;
    let result = Detector::new(config, Arc::new(NullSink));
    assert!(matches!(result, Err(DetectorError::Config(_))));
}

#[test]
fn forget_object_drops_its_locations() {
    let (detector, _sink) = counting_detector();
    let t0 = ThreadId::new(0);
    let elem = AccessTarget::array(ObjectId::new(2), 0);
    detector.handle(&AccessEvent::write(t0, field(), SiteId::new(1)).into()).unwrap();
    detector.handle(&AccessEvent::write(t0, elem, SiteId::new(1)).into()).unwrap();
    assert_eq!(detector.context().shadowed_locations(), 2);

    detector.forget_object(ObjectId::new(2));
    assert_eq!(detector.context().shadowed_locations(), 1);
}

#[test]
fn pipeline_runs_stages_in_order() {
    let pipeline = Pipeline::standard(true);
    assert_eq!(pipeline.stage_names(), vec!["event-trace", "fasttrack"]);
    assert_eq!(Pipeline::standard(false).stage_names(), vec!["fasttrack"]);
}

#[test]
fn describe_thread_shows_clock_and_epoch() {
    let (detector, _sink) = counting_detector();
    assert!(detector.describe_thread(ThreadId::new(1)).is_none());
    detector
        .handle(&Event::ThreadCreated { thread: ThreadId::new(1) })
        .unwrap();
    assert_eq!(
        detector.describe_thread(ThreadId::new(1)).unwrap(),
        "[tid=T1 C=[(0:0), (1:2)] E=(1:2)]"
    );
}

#[test]
fn detector_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Detector>();
}
