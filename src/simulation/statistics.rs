//! Statistics collection and reporting
//!
//! [`StatsAggregator`] is the live, lock-free counter set shared by every unit
//! of a run. [`SimulationStats`] is the read-only snapshot handed back to the
//! caller once the run is finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::simulation::SharedClock;
use crate::types::{RunId, SimulationMode};

const NOT_FINISHED: u64 = u64::MAX;

/// Thread-safe run counters
///
/// Every operation is a single atomic update; none of them blocks.
#[derive(Debug)]
pub struct StatsAggregator {
    users_created: AtomicU64,
    events_sent: AtomicU64,
    errors: AtomicU64,
    cancelled: AtomicBool,
    /// Micros from `started` to `finish()`, `NOT_FINISHED` until then
    finished_after_micros: AtomicU64,
    started: Instant,
    start_time: DateTime<Utc>,
}

impl StatsAggregator {
    /// Start a new aggregation, stamping the start time from `clock`
    pub fn new(clock: &SharedClock) -> Self {
        Self {
            users_created: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            finished_after_micros: AtomicU64::new(NOT_FINISHED),
            started: Instant::now(),
            start_time: clock.now(),
        }
    }

    /// Count one successful user; returns the running total
    pub fn increment_created(&self) -> u64 {
        self.users_created.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Count one failed unit; returns the running total
    pub fn increment_errors(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Count `n` emitted events; returns the running total
    pub fn add_events(&self, n: u64) -> u64 {
        self.events_sent.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Flag the run as cancelled before all units were launched
    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Record the end of the run (last write wins)
    pub fn finish(&self) {
        let micros = self.started.elapsed().as_micros().min(u128::from(NOT_FINISHED - 1)) as u64;
        self.finished_after_micros.store(micros, Ordering::Release);
    }

    /// Successful users so far
    pub fn users_created(&self) -> u64 {
        self.users_created.load(Ordering::Acquire)
    }

    /// Events emitted so far
    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Acquire)
    }

    /// Failed units so far
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Acquire)
    }

    /// Units that reached a terminal state
    pub fn units_completed(&self) -> u64 {
        self.users_created() + self.errors()
    }

    /// Whether `finish()` has been called
    pub fn is_finished(&self) -> bool {
        self.finished_after_micros.load(Ordering::Acquire) != NOT_FINISHED
    }

    /// Snapshot of the counters, tagged with run metadata
    ///
    /// Before `finish()` the duration is measured up to now and `end_time` is `None`.
    pub fn snapshot(&self, run_id: RunId, mode: SimulationMode, units_requested: u64) -> SimulationStats {
        let finished = self.finished_after_micros.load(Ordering::Acquire);
        let (duration, end_time) = if finished == NOT_FINISHED {
            (self.started.elapsed(), None)
        } else {
            let duration = Duration::from_micros(finished);
            let end = chrono::Duration::from_std(duration)
                .ok()
                .map(|elapsed| self.start_time + elapsed);
            (duration, end)
        };

        SimulationStats {
            run_id,
            mode,
            units_requested,
            users_created: self.users_created(),
            events_sent: self.events_sent(),
            errors: self.errors(),
            cancelled: self.cancelled.load(Ordering::Acquire),
            start_time: self.start_time,
            end_time,
            duration,
        }
    }
}

/// Final statistics of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Run this report belongs to
    pub run_id: RunId,
    /// Mode the run executed in
    pub mode: SimulationMode,
    /// Units the run set out to attempt, after clamping to the daily ceiling
    pub units_requested: u64,
    /// Units that completed successfully
    pub users_created: u64,
    /// Events emitted or nominally triggered by successful units
    pub events_sent: u64,
    /// Units that failed
    pub errors: u64,
    /// The run was interrupted before every unit was launched
    pub cancelled: bool,
    /// When the run started
    pub start_time: DateTime<Utc>,
    /// When the run finished
    pub end_time: Option<DateTime<Utc>>,
    /// Run duration
    pub duration: Duration,
}

impl SimulationStats {
    /// Run duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Successful users per second, 0 for an instantaneous run
    pub fn users_per_second(&self) -> f64 {
        let secs = self.duration_seconds();
        if secs > 0.0 {
            self.users_created as f64 / secs
        } else {
            0.0
        }
    }

    /// Events per second, 0 for an instantaneous run
    pub fn events_per_second(&self) -> f64 {
        let secs = self.duration_seconds();
        if secs > 0.0 {
            self.events_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Units that reached a terminal state
    pub fn units_completed(&self) -> u64 {
        self.users_created + self.errors
    }

    /// Share of completed units that succeeded, as a percentage
    pub fn success_percentage(&self) -> f64 {
        let completed = self.units_completed();
        if completed == 0 {
            0.0
        } else {
            (self.users_created as f64 / completed as f64) * 100.0
        }
    }

    /// Human-readable end-of-run report
    pub fn generate_summary_output(&self) -> String {
        let mut output = String::new();
        let rule = "═".repeat(40);

        output.push_str(&format!("{}\n", rule));
        if self.cancelled {
            output.push_str("Simulation Interrupted\n");
        } else {
            output.push_str("Simulation Complete!\n");
        }
        output.push_str(&format!("{}\n", rule));
        output.push_str(&format!("  Run:              {}\n", self.run_id));
        output.push_str(&format!("  Mode:             {}\n", self.mode));
        output.push_str(&format!(
            "  Users created:    {} / {}\n",
            self.users_created, self.units_requested
        ));
        output.push_str(&format!("  Events sent:      {}\n", self.events_sent));
        output.push_str(&format!(
            "  Errors:           {} ({:.1}% success)\n",
            self.errors,
            self.success_percentage()
        ));
        output.push_str(&format!("  Duration:         {:.2}s\n", self.duration_seconds()));
        output.push_str(&format!("  Users/second:     {:.2}\n", self.users_per_second()));
        output.push_str(&format!("  Events/second:    {:.2}\n", self.events_per_second()));

        output
    }
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} events, {} errors in {:.2}s",
            self.users_created,
            self.events_sent,
            self.errors,
            self.duration_seconds()
        )
    }
}
