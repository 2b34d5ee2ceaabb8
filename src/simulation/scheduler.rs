//! Batch scheduler
//!
//! Splits `[0, total)` into consecutive batches and runs each batch's units
//! concurrently, joining every unit of a batch before the next batch starts.
//! How many units of a batch actually run at once is up to the admission gate
//! the units acquire, not the batch size.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::simulation::{SimulationError, StatsAggregator};

/// What the scheduler did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleReport {
    /// Batches started
    pub batches_run: u64,
    /// Units spawned
    pub units_launched: u64,
    /// Units whose task panicked
    pub units_panicked: u64,
    /// Cancellation stopped the schedule before every batch was launched
    pub stopped_early: bool,
}

/// Drives units batch by batch
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: u64,
    stats: Arc<StatsAggregator>,
}

/// Consecutive half-open ranges of at most `batch_size` covering `[0, total)`
pub fn batch_ranges(total: u64, batch_size: u64) -> Vec<Range<u64>> {
    let batch_size = batch_size.max(1);
    (0..total)
        .step_by(batch_size as usize)
        .map(|start| start..(start + batch_size).min(total))
        .collect()
}

impl BatchScheduler {
    /// Scheduler with a fixed batch size (at least one)
    ///
    /// Panicking units are counted as errors in `stats`.
    pub fn new(batch_size: usize, stats: Arc<StatsAggregator>) -> Self {
        Self { batch_size: batch_size.max(1) as u64, stats }
    }

    /// Batch size
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Run `unit(index, total)` for every index in `[0, total)`
    ///
    /// # Arguments
    /// * `total` - Number of units
    /// * `cancel` - Checked before each batch; once cancelled no further batch starts
    /// * `unit` - Builds the future for one unit. The future handles its own
    ///   failures; a panic inside it is caught here and counted as an error
    ///
    /// # Returns
    /// A report of the batches and units that were launched
    #[instrument(skip(self, cancel, unit), fields(batch_size = self.batch_size))]
    pub async fn run<F, Fut>(&self, total: u64, cancel: &CancellationToken, unit: F) -> ScheduleReport
    where
        F: Fn(u64, u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ranges = batch_ranges(total, self.batch_size);
        let batch_count = ranges.len();
        let mut report = ScheduleReport::default();

        info!("Scheduling {} units in {} batches", total, batch_count);

        for (batch_index, range) in ranges.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Cancelled before batch {} of {}", batch_index + 1, batch_count);
                report.stopped_early = true;
                break;
            }

            debug!("Starting batch {} of {} ({:?})", batch_index + 1, batch_count, range);
            report.batches_run += 1;

            let mut units = JoinSet::new();
            for index in range {
                units.spawn(unit(index, total));
                report.units_launched += 1;
            }

            let batch_span = crate::perf_span!("batch", batch = batch_index + 1, units = units.len());
            async {
                while let Some(joined) = units.join_next().await {
                    if let Err(e) = joined {
                        let error = SimulationError::from(e);
                        report.units_panicked += 1;
                        let errors = self.stats.increment_errors();
                        warn!(category = error.category(), errors, "{}", error);
                    }
                }
            }
            .instrument(batch_span)
            .await;

            debug!("Finished batch {} of {}", batch_index + 1, batch_count);
        }

        report
    }
}
