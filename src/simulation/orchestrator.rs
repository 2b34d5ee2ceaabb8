//! Main simulation orchestrator
//!
//! This module contains the [`UserSimulator`], the entry point of a run: it
//! clamps the requested count, sizes the admission gate, opens one context per
//! collaborator the mode needs, drives the batch scheduler and returns the
//! final statistics.

use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::events::{EventSink, EventSinkContext};
use crate::session::{IdentityResolver, SessionContext, SessionProvider};
use crate::simulation::{
    AdmissionController, BatchScheduler, BrowserOnlyStrategy, HybridStrategy, ModeStrategy,
    ProtocolOnlyStrategy, RandomSource, SharedClock, SimulationError, SimulationResult,
    SimulationStats, StatsAggregator, SystemClock, UnitEnvironment,
};
use crate::types::{RunId, SimulationConfig, SimulationMode};

/// Progress callback: `(completed_so_far, total)`
///
/// Called from whichever task finished the unit, possibly concurrently.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Runs simulations against a pair of collaborators
pub struct UserSimulator {
    config: Arc<SimulationConfig>,
    sessions: Arc<dyn SessionProvider>,
    sink: Arc<dyn EventSink>,
    clock: SharedClock,
    rng: RandomSource,
    progress: Option<ProgressCallback>,
    /// Interrupts the current run, or the next one if none is running
    cancel: Mutex<CancellationToken>,
}

impl std::fmt::Debug for UserSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSimulator")
            .field("config", &self.config)
            .field("sessions", &self.sessions.name())
            .field("sink", &self.sink.name())
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancellation_token().is_cancelled())
            .finish()
    }
}

struct RunContexts {
    sessions: Option<Arc<dyn SessionContext>>,
    sink: Option<Arc<dyn EventSinkContext>>,
}

impl RunContexts {
    async fn close(self) {
        if let Some(sessions) = self.sessions {
            if let Err(e) = sessions.close().await {
                warn!(error = %e, "Failed to close session context");
            }
        }
        if let Some(sink) = self.sink {
            if let Err(e) = sink.close().await {
                warn!(error = %e, "Failed to close event sink context");
            }
        }
    }
}

impl UserSimulator {
    /// Create a simulator
    ///
    /// # Arguments
    /// * `config` - Run configuration; validated here
    /// * `sessions` - Session Provider used by browser-only and hybrid runs
    /// * `sink` - Event Sink used by protocol-only and hybrid runs
    ///
    /// # Returns
    /// The simulator, or a configuration error
    pub fn new(
        config: SimulationConfig,
        sessions: Arc<dyn SessionProvider>,
        sink: Arc<dyn EventSink>,
    ) -> SimulationResult<Self> {
        config.validate()?;
        let rng = RandomSource::from_optional_seed(config.seed);

        Ok(Self {
            config: Arc::new(config),
            sessions,
            sink,
            clock: Arc::new(SystemClock),
            rng,
            progress: None,
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the random source
    pub fn with_random_source(mut self, rng: RandomSource) -> Self {
        self.rng = rng;
        self
    }

    /// Report progress after every successful unit
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Use an externally owned cancellation token for the next run
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Mutex::new(cancel);
        self
    }

    /// Token that interrupts the current run, or the next one if none is running
    ///
    /// A run that ends cancelled replaces the token with a fresh one, so later
    /// runs start uninterrupted. Fetch the token again for each run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn rearm_cancellation(&self) {
        let mut cancel = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    async fn open_contexts(&self, mode: SimulationMode, validate: bool) -> SimulationResult<RunContexts> {
        let sessions = if mode.uses_session_provider() {
            debug!(backend = self.sessions.name(), "Opening session context");
            Some(self.sessions.open_context().await?)
        } else {
            None
        };

        let sink = if mode.uses_event_sink() {
            debug!(backend = self.sink.name(), validate, "Opening event sink context");
            match self.sink.open_context(validate).await {
                Ok(sink) => Some(sink),
                Err(e) => {
                    RunContexts { sessions, sink: None }.close().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(RunContexts { sessions, sink })
    }

    fn build_strategy(&self, mode: SimulationMode, contexts: &RunContexts) -> SimulationResult<Arc<dyn ModeStrategy>> {
        let env = UnitEnvironment {
            config: Arc::clone(&self.config),
            rng: self.rng.clone(),
            clock: Arc::clone(&self.clock),
        };
        let sessions = || {
            contexts
                .sessions
                .clone()
                .ok_or_else(|| SimulationError::session_setup_error("no session context open"))
        };
        let sink = || {
            contexts
                .sink
                .clone()
                .ok_or_else(|| SimulationError::event_sink_setup_error("no event sink context open"))
        };

        let strategy: Arc<dyn ModeStrategy> = match mode {
            SimulationMode::ProtocolOnly => Arc::new(ProtocolOnlyStrategy::new(sink()?, env)),
            SimulationMode::BrowserOnly => Arc::new(BrowserOnlyStrategy::new(sessions()?, env)),
            SimulationMode::Hybrid => Arc::new(HybridStrategy::new(
                sessions()?,
                sink()?,
                IdentityResolver::new(Arc::clone(&self.clock))?,
                self.config.ga4.measurement_id.clone(),
                env,
            )),
        };
        Ok(strategy)
    }

    /// Simulate `requested` users
    ///
    /// # Arguments
    /// * `requested` - Users asked for; anything above the daily ceiling is dropped
    /// * `mode` - Which collaborators each user goes through
    /// * `validate` - Open the Event Sink against its validation endpoint
    ///
    /// # Returns
    /// Final statistics. Only a collaborator setup failure is an error; unit
    /// failures are counted in the statistics.
    pub async fn simulate(
        &self,
        requested: u64,
        mode: SimulationMode,
        validate: bool,
    ) -> SimulationResult<SimulationStats> {
        let run_id = RunId::new();
        let span = tracing::info_span!("simulate", run_id = %run_id, mode = %mode);
        self.simulate_run(run_id, requested, mode, validate).instrument(span).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn simulate_run(
        &self,
        run_id: RunId,
        requested: u64,
        mode: SimulationMode,
        validate: bool,
    ) -> SimulationResult<SimulationStats> {
        let total = self.config.clamp_users(requested);
        if total < requested {
            info!("Clamped {} requested users to the daily ceiling of {}", requested, total);
        }

        let admission = AdmissionController::new(self.config.effective_concurrency(mode));
        info!(
            "Simulating {} users in {} mode (concurrency {}, batch size {})",
            total,
            mode,
            admission.capacity(),
            mode.batch_size()
        );

        let contexts = self.open_contexts(mode, validate).await?;
        let strategy = match self.build_strategy(mode, &contexts) {
            Ok(strategy) => strategy,
            Err(e) => {
                contexts.close().await;
                return Err(e);
            }
        };

        let cancel = self.cancellation_token();
        let stats = Arc::new(StatsAggregator::new(&self.clock));
        let scheduler = BatchScheduler::new(mode.batch_size(), Arc::clone(&stats));

        let report = {
            let schedule = scheduler.run(total, &cancel, |index, total| {
                run_unit(
                    index,
                    total,
                    Arc::clone(&strategy),
                    admission.clone(),
                    Arc::clone(&stats),
                    self.progress.clone(),
                )
            });
            tokio::pin!(schedule);
            // Cancellation closes the gate so units still waiting for a slot give up
            tokio::select! {
                report = &mut schedule => report,
                _ = cancel.cancelled() => {
                    admission.close();
                    schedule.await
                }
            }
        };

        stats.finish();
        if cancel.is_cancelled() {
            if stats.units_completed() < total {
                stats.mark_cancelled();
            }
            self.rearm_cancellation();
        }
        drop(strategy);
        contexts.close().await;

        let snapshot = stats.snapshot(run_id, mode, total);
        crate::sim_event!(
            info,
            format!("Simulation finished: {}", snapshot),
            batches = report.batches_run,
            peak_in_flight = admission.peak_in_flight(),
            cancelled = snapshot.cancelled,
        );
        Ok(snapshot)
    }
}

/// One admitted unit: wait for a slot, run the strategy, account for the outcome
///
/// A unit still waiting when the gate closes is abandoned and counted nowhere.
async fn run_unit(
    index: u64,
    total: u64,
    strategy: Arc<dyn ModeStrategy>,
    admission: AdmissionController,
    stats: Arc<StatsAggregator>,
    progress: Option<ProgressCallback>,
) {
    let _permit = match admission.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            debug!(index, error = %e, "Unit abandoned while waiting for admission");
            return;
        }
    };

    match strategy.run_unit(index, total).await {
        Ok(report) => {
            stats.add_events(report.events);
            let created = stats.increment_created();
            if let Some(progress) = &progress {
                progress(created, total);
            }
        }
        Err(e) => {
            let errors = stats.increment_errors();
            warn!(
                index,
                mode = %strategy.mode(),
                category = e.category(),
                errors,
                "Unit failed: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MockEventSink;
    use crate::session::MockSessionProvider;

    fn simulator(config: SimulationConfig) -> (UserSimulator, MockSessionProvider, MockEventSink) {
        let sessions = MockSessionProvider::default();
        let sink = MockEventSink::new();
        let sim = UserSimulator::new(config, Arc::new(sessions.clone()), Arc::new(sink.clone()))
            .unwrap()
            .with_random_source(RandomSource::seeded(1));
        (sim, sessions, sink)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SimulationConfig { max_daily_users: 0, ..Default::default() };
        let result = UserSimulator::new(
            config,
            Arc::new(MockSessionProvider::default()),
            Arc::new(MockEventSink::new()),
        );
        assert!(matches!(result, Err(SimulationError::ConfigurationError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_run_opens_only_the_sink() {
        let (sim, sessions, sink) = simulator(SimulationConfig::default());
        let stats = sim.simulate(5, SimulationMode::ProtocolOnly, false).await.unwrap();

        assert_eq!(stats.users_created, 5);
        assert_eq!(stats.events_sent, 20);
        assert_eq!(sessions.contexts_opened(), 0);
        assert_eq!(sink.contexts_opened(), 1);
        assert_eq!(sink.contexts_closed(), 1);
        assert!(stats.end_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_users_is_a_valid_run() {
        let (sim, _, _) = simulator(SimulationConfig::default());
        let stats = sim.simulate(0, SimulationMode::Hybrid, false).await.unwrap();
        assert_eq!(stats.units_completed(), 0);
        assert_eq!(stats.users_per_second(), 0.0);
        assert!(!stats.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_setup_failure_closes_opened_session_context() {
        let sessions = MockSessionProvider::default();
        let sim = UserSimulator::new(
            SimulationConfig::default(),
            Arc::new(sessions.clone()),
            Arc::new(MockEventSink::new().fail_setup()),
        )
        .unwrap();

        let err = sim.simulate(3, SimulationMode::Hybrid, false).await.unwrap_err();
        assert!(err.is_setup_failure());
        assert_eq!(sessions.contexts_opened(), 1);
        assert_eq!(sessions.contexts_closed(), 1);
        assert_eq!(sessions.bootstrap_calls(), 0);
    }
}
