//! Session hooks.
//!
//! Hooks are called at fixed extension points of the step loop to observe
//! the run. They see physical units and cannot alter the session.
//!
//! # Lifecycle
//!
//! ```text
//! hook.on_session_initialized(initial)
//! for each accepted step:
//!   hook.on_step_accepted(state, record)
//! hook.on_session_finished(success)
//! ```

use sinter_model::{StepRecord, SystemState};

/// Trait for session observers.
pub trait SessionHook: Send {
    /// Called once with the initial state, after contacts are resolved.
    fn on_session_initialized(&mut self, state: &SystemState) {
        let _ = state;
    }

    /// Called after every accepted step.
    fn on_step_accepted(&mut self, state: &SystemState, record: &StepRecord) {
        let _ = (state, record);
    }

    /// Called when the run ends, successfully or not.
    fn on_session_finished(&mut self, success: bool) {
        let _ = success;
    }

    /// Returns the hook's name for logging.
    fn name(&self) -> &str;
}

/// Snapshot handed to a [`ProgressHook`] reporter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub step: u64,
    /// Simulated time (s).
    pub time: f64,
    /// Width of the step just accepted (s).
    pub step_width: f64,
    /// Share of the simulated interval covered so far, in percent.
    pub percent: f64,
}

type Reporter = Box<dyn FnMut(&Progress) + Send>;

/// Reports progress every `every` accepted steps.
///
/// Percentages are measured from the initial state's time, so runs that
/// resume from a stored state start at zero.
pub struct ProgressHook {
    every: u64,
    start_time: f64,
    end_time: f64,
    report: Reporter,
}

impl ProgressHook {
    pub fn new(every: u64, end_time: f64, report: impl FnMut(&Progress) + Send + 'static) -> Self {
        Self {
            every: every.max(1),
            start_time: 0.0,
            end_time,
            report: Box::new(report),
        }
    }

    /// Reports through `tracing` at info level.
    pub fn logging(every: u64, end_time: f64) -> Self {
        Self::new(every, end_time, |p: &Progress| {
            tracing::info!(
                step = p.step,
                time = p.time,
                step_width = p.step_width,
                percent = p.percent,
                "progress"
            );
        })
    }

    /// Percentage of `[start, end]` reached at `time`.
    pub fn percent(&self, time: f64) -> f64 {
        let span = self.end_time - self.start_time;
        if span > 0.0 {
            (100.0 * (time - self.start_time) / span).clamp(0.0, 100.0)
        } else {
            100.0
        }
    }
}

impl SessionHook for ProgressHook {
    fn on_session_initialized(&mut self, state: &SystemState) {
        self.start_time = state.time();
    }

    fn on_step_accepted(&mut self, state: &SystemState, record: &StepRecord) {
        if record.index % self.every != 0 {
            return;
        }
        let progress = Progress {
            step: record.index,
            time: state.time(),
            step_width: record.step_width,
            percent: self.percent(state.time()),
        };
        (self.report)(&progress);
    }

    fn name(&self) -> &str {
        "progress"
    }
}
