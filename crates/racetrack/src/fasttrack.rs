//! The FastTrack handler: clock updates for every synchronization event and
//! the sampled shadow-state check for every access.
//!
//! # Locking
//!
//! A handler holds at most its own thread's lock plus one object lock
//! (a lock, volatile, class or barrier clock, or a shadow variable) at a
//! time. Another thread's clock is copied out under that thread's lock
//! before the acting thread's lock is taken, so two thread locks are never
//! held together.

use racetrack_types::{BarrierId, ClassId, LockId, ThreadId, VolatileId};

use crate::context::AnalysisContext;
use crate::event::{AccessEvent, Event};
use crate::handler::EventHandler;
use crate::report::RaceReport;
use crate::stats::Rule;
use crate::DetectorError;

/// Happens-before race checker.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastTrack;

impl EventHandler for FastTrack {
    fn name(&self) -> &'static str {
        "fasttrack"
    }

    fn handle(&self, ctx: &AnalysisContext, event: &Event) -> Result<(), DetectorError> {
        match *event {
            Event::ThreadCreated { thread } => ctx.thread(thread).map(drop),
            Event::ThreadStart { thread, child } => start(ctx, thread, child),
            Event::ThreadStop { thread } => {
                ctx.counters().record(Rule::Other);
                ctx.threads().stop(thread)
            }
            Event::Join { thread, joined } => join(ctx, thread, joined),
            Event::Acquire { thread, lock } => {
                ctx.counters().record(Rule::Acquire);
                acquire(ctx, thread, lock)
            }
            Event::Release { thread, lock } => {
                ctx.counters().record(Rule::Release);
                release(ctx, thread, lock)
            }
            Event::PreWait { thread, lock } => {
                ctx.counters().record(Rule::Wait);
                release(ctx, thread, lock)
            }
            Event::PostWait { thread, lock } => {
                ctx.counters().record(Rule::Wait);
                acquire(ctx, thread, lock)
            }
            Event::VolatileAccess {
                thread,
                volatile,
                is_write,
            } => volatile_access(ctx, thread, volatile, is_write),
            Event::Access(access) => self.access(ctx, &access),
            Event::BarrierEnter { thread, barrier } => barrier_enter(ctx, thread, barrier),
            Event::BarrierExit { thread, barrier } => barrier_exit(ctx, thread, barrier),
            Event::ClassInitialized { thread, class } => class_initialized(ctx, thread, class),
            Event::ClassAccessed { thread, class } => class_accessed(ctx, thread, class),
        }
    }
}

impl FastTrack {
    fn access(&self, ctx: &AnalysisContext, access: &AccessEvent) -> Result<(), DetectorError> {
        let handle = ctx.thread(access.thread)?;
        let var = ctx.shadow_var(access.target.location());
        let mut thread = handle.lock();

        // Static state is only visible after the class initializer ran.
        if let Some(class) = access.target.static_owner() {
            let init = ctx.sync().class_clock(class);
            thread.max_epoch_and_cv(&init.lock());
        }

        if !ctx.sampler().should_check(access.thread, &var) {
            ctx.counters().record(Rule::Skipped);
            return Ok(());
        }
        ctx.counters().record(Rule::Sampled);

        let outcome = if access.is_write {
            var.write(&thread)
        } else {
            var.read(&thread, ctx.reader_slots())
        };
        ctx.counters().record(outcome.rule);
        if outcome.races.is_empty() {
            return Ok(());
        }

        let thread_clock = thread.clock().clone();
        drop(thread);

        // One count per race kind per access; a shared write naming several
        // readers is one error.
        let mut kinds: Vec<_> = outcome.races.iter().map(|f| f.kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        for kind in kinds {
            ctx.counters().record_race(kind);
        }

        let location = access.target.location();
        for finding in outcome.races {
            if !ctx.sink().still_looking(access.site) {
                continue;
            }
            ctx.sink().report(RaceReport {
                kind: finding.kind,
                site: access.site,
                location,
                previous: finding.previous,
                current: finding.current,
                shadow: finding.shadow,
                thread_clock: thread_clock.clone(),
            });
        }
        Ok(())
    }
}

fn acquire(ctx: &AnalysisContext, tid: ThreadId, lock: LockId) -> Result<(), DetectorError> {
    let handle = ctx.thread(tid)?;
    let clock = ctx.sync().lock_clock(lock);
    let mut thread = handle.lock();
    thread.max_epoch_and_cv(&clock.lock());
    Ok(())
}

fn release(ctx: &AnalysisContext, tid: ThreadId, lock: LockId) -> Result<(), DetectorError> {
    let handle = ctx.thread(tid)?;
    let clock = ctx.sync().lock_clock(lock);
    let mut thread = handle.lock();
    clock.lock().max(thread.clock());
    thread.inc_epoch_and_cv();
    Ok(())
}

fn volatile_access(
    ctx: &AnalysisContext,
    tid: ThreadId,
    volatile: VolatileId,
    is_write: bool,
) -> Result<(), DetectorError> {
    ctx.counters().record(Rule::Volatile);
    let handle = ctx.thread(tid)?;
    let clock = ctx.sync().volatile_clock(volatile);
    let mut thread = handle.lock();
    if is_write {
        clock.lock().max(thread.clock());
        thread.inc_epoch_and_cv();
    } else {
        thread.max_epoch_and_cv(&clock.lock());
    }
    Ok(())
}

fn start(ctx: &AnalysisContext, parent: ThreadId, child: ThreadId) -> Result<(), DetectorError> {
    if parent == child {
        return Err(DetectorError::SelfEdge(parent));
    }
    ctx.counters().record(Rule::Fork);

    let parent_handle = ctx.thread(parent)?;
    let child_handle = ctx.thread(child)?;

    let parent_clock = parent_handle.lock().clock().clone();
    child_handle.lock().max_and_inc_epoch_and_cv(&parent_clock);
    parent_handle.lock().inc_epoch_and_cv();
    Ok(())
}

fn join(ctx: &AnalysisContext, tid: ThreadId, joined: ThreadId) -> Result<(), DetectorError> {
    if tid == joined {
        return Err(DetectorError::SelfEdge(tid));
    }
    ctx.counters().record(Rule::Join);

    let joined_clock = ctx.existing_thread(joined)?.lock().clock().clone();
    let handle = ctx.thread(tid)?;
    handle.lock().max_epoch_and_cv(&joined_clock);
    Ok(())
}

fn barrier_enter(
    ctx: &AnalysisContext,
    tid: ThreadId,
    barrier: BarrierId,
) -> Result<(), DetectorError> {
    ctx.counters().record(Rule::Barrier);
    let handle = ctx.thread(tid)?;
    let state = ctx.sync().barrier(barrier);
    let thread = handle.lock();
    state.lock().enter(tid, thread.clock());
    Ok(())
}

fn barrier_exit(
    ctx: &AnalysisContext,
    tid: ThreadId,
    barrier: BarrierId,
) -> Result<(), DetectorError> {
    ctx.counters().record(Rule::Barrier);
    let handle = ctx.thread(tid)?;
    let state = ctx.sync().barrier(barrier);
    let mut thread = handle.lock();
    let merged = state
        .lock()
        .exit(tid)
        .ok_or(DetectorError::BarrierExitWithoutEntry {
            thread: tid,
            barrier,
        })?;
    thread.max_and_inc_epoch_and_cv(&merged);
    Ok(())
}

fn class_initialized(
    ctx: &AnalysisContext,
    tid: ThreadId,
    class: ClassId,
) -> Result<(), DetectorError> {
    ctx.counters().record(Rule::Other);
    let handle = ctx.thread(tid)?;
    let clock = ctx.sync().class_clock(class);
    let mut thread = handle.lock();
    clock.lock().copy_from(thread.clock());
    thread.inc_epoch_and_cv();
    Ok(())
}

fn class_accessed(ctx: &AnalysisContext, tid: ThreadId, class: ClassId) -> Result<(), DetectorError> {
    ctx.counters().record(Rule::Other);
    let handle = ctx.thread(tid)?;
    let clock = ctx.sync().class_clock(class);
    let mut thread = handle.lock();
    thread.max_epoch_and_cv(&clock.lock());
    Ok(())
}
