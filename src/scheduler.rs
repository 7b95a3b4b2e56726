//! Cooperative time-sliced scheduler (C7, §4.6, §5).
//!
//! All operator, source, and view state for one engine instance lives on one
//! logical execution context. `TimeSliceTimer` lets long hydration/advance
//! loops check in periodically and yield back to the caller rather than
//! monopolizing the thread; suspension happens only between whole `Change`
//! applications, never inside a join's child-sequence rebuild (§4.6).
//!
//! The EDF (earliest-deadline-first) framing for bounding interleaved work —
//! Liu & Layland, "Scheduling Algorithms for Multiprogramming in a Hard-
//! Real-Time Environment", JACM 1973 — is the same citation the teacher's
//! DAG scheduler used to justify running refreshes in topological-dependency
//! order under a wall-clock budget; here it informs the yield discipline
//! instead of refresh ordering.

use crate::error::EngineError;

/// Supplies the current time and the cancel/deadline signal a caller wants
/// honored. Tests implement this with a synthetic clock (S6); production
/// wraps `std::time::Instant` and an external cancellation flag.
pub trait Clock {
    fn now_ms(&self) -> u64;
    /// Called when the timer wants to yield; returns `Err` to cancel the
    /// run (cooperative cancel or deadline, §5).
    fn should_yield(&mut self, elapsed_ms: u64) -> Result<bool, EngineError>;
}

/// A clock driven purely by explicit advances, for deterministic tests.
#[derive(Debug, Default)]
pub struct SyntheticClock {
    now: u64,
}

impl SyntheticClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }
}

impl Clock for SyntheticClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn should_yield(&mut self, _elapsed_ms: u64) -> Result<bool, EngineError> {
        Ok(false)
    }
}

/// Tracks elapsed time within one lap (one unit of bounded work, e.g. one
/// `Change` applied to the graph) and forces a yield once the configured
/// slice is exceeded.
pub struct TimeSliceTimer {
    threshold_ms: u64,
    lap_started_at: u64,
    yields: u64,
}

impl TimeSliceTimer {
    pub fn new(threshold_ms: u64) -> Self {
        Self { threshold_ms, lap_started_at: 0, yields: 0 }
    }

    /// Starts a fresh lap at `now`. Call at the top of every loop iteration
    /// whose body is one indivisible unit of work.
    pub fn start_lap(&mut self, now_ms: u64) {
        self.lap_started_at = now_ms;
    }

    /// Checks elapsed time since `start_lap` and yields (invoking
    /// `yieldProcess` semantics via `clock.should_yield`) if the configured
    /// slice has been exceeded.
    pub fn elapsed_lap(&mut self, clock: &mut dyn Clock) -> Result<(), EngineError> {
        let elapsed = clock.now_ms().saturating_sub(self.lap_started_at);
        if elapsed >= self.threshold_ms {
            self.yield_process(clock)?;
        }
        Ok(())
    }

    fn yield_process(&mut self, clock: &mut dyn Clock) -> Result<(), EngineError> {
        self.yields += 1;
        tracing::debug!(yields = self.yields, threshold_ms = self.threshold_ms, "yielding time slice");
        let cancel = clock.should_yield(self.threshold_ms)?;
        if cancel {
            return Err(EngineError::Cancelled("time slice yield cancelled".into()));
        }
        Ok(())
    }

    pub fn yield_count(&self) -> u64 {
        self.yields
    }
}

/// Drives a sequence of bounded work items (one `Change` each) through
/// `step`, yielding between items per the configured time slice. `lap_ms`
/// models the elapsed wall-clock cost of applying one item, supplied by the
/// caller (tests use a fixed synthetic increment per S6).
pub fn run_with_yields<T, F>(
    items: Vec<T>,
    threshold_ms: u64,
    clock: &mut dyn Clock,
    lap_ms: u64,
    mut step: F,
) -> Result<u64, EngineError>
where
    F: FnMut(T) -> Result<(), EngineError>,
{
    let mut timer = TimeSliceTimer::new(threshold_ms);
    timer.start_lap(clock.now_ms());
    for item in items {
        step(item)?;
        // SyntheticClock in tests is advanced by the caller between steps;
        // production clocks advance themselves as wall time passes.
        let _ = lap_ms;
        timer.elapsed_lap(clock)?;
        if timer.yield_count() > 0 {
            timer.start_lap(clock.now_ms());
        }
    }
    Ok(timer.yield_count())
}
