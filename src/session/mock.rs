//! In-process Session Provider
//!
//! Used by the `--offline` backend and by tests. Calls are numbered in the
//! order they start; failures can be injected by call number and every call
//! is recorded on a shared timeline.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::session::{
    session_cookie_name, SessionContext, SessionDescriptor, SessionProvider, CLIENT_COOKIE,
};
use crate::simulation::{InFlightGauge, SimulationError, SimulationResult};

/// One entry of the bootstrap timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// Call number `n` started
    Started(u64),
    /// Call number `n` returned, successfully or not
    Finished(u64),
}

#[derive(Debug, Default)]
struct MockState {
    contexts_opened: AtomicU64,
    contexts_closed: AtomicU64,
    calls: AtomicU64,
    in_flight: Arc<InFlightGauge>,
    timeline: Mutex<Vec<BootstrapEvent>>,
    engagements: Mutex<Vec<Duration>>,
}

impl MockState {
    fn record(&self, event: BootstrapEvent) {
        self.timeline.lock().unwrap_or_else(|p| p.into_inner()).push(event);
    }
}

/// Configurable fake Session Provider
#[derive(Debug, Clone)]
pub struct MockSessionProvider {
    delay: Duration,
    descriptor: SessionDescriptor,
    fail_setup: bool,
    failing_calls: HashSet<u64>,
    fail_every: Option<u64>,
    state: Arc<MockState>,
}

impl Default for MockSessionProvider {
    fn default() -> Self {
        Self::new("https://example.com/")
    }
}

impl MockSessionProvider {
    /// Provider whose visits end on `page_location` with no cookies
    pub fn new(page_location: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            descriptor: SessionDescriptor::new(page_location).with_title("Home"),
            fail_setup: false,
            failing_calls: HashSet::new(),
            fail_every: None,
            state: Arc::new(MockState::default()),
        }
    }

    /// Time each bootstrap takes
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Descriptor returned by every successful bootstrap
    pub fn with_descriptor(mut self, descriptor: SessionDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Leave well-formed analytics cookies for `measurement_id`
    pub fn with_analytics_cookies(
        mut self,
        measurement_id: &str,
        client_id: &str,
        session_id: u64,
    ) -> Self {
        self.descriptor = self
            .descriptor
            .with_cookie(CLIENT_COOKIE, format!("GA1.1.{}", client_id))
            .with_cookie(
                session_cookie_name(measurement_id),
                format!("GS1.1.{}.1.1.0.0.0", session_id),
            );
        self
    }

    /// Make `open_context` fail
    pub fn fail_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Make bootstrap call number `call` (0-based, in start order) fail
    pub fn fail_on_call(mut self, call: u64) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Make every `n`-th bootstrap call fail (calls `n-1`, `2n-1`, ...)
    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Contexts opened so far
    pub fn contexts_opened(&self) -> u64 {
        self.state.contexts_opened.load(Ordering::Acquire)
    }

    /// Contexts closed so far
    pub fn contexts_closed(&self) -> u64 {
        self.state.contexts_closed.load(Ordering::Acquire)
    }

    /// Bootstrap calls started so far
    pub fn bootstrap_calls(&self) -> u64 {
        self.state.calls.load(Ordering::Acquire)
    }

    /// Most bootstrap calls ever running at once
    pub fn peak_concurrency(&self) -> usize {
        self.state.in_flight.peak()
    }

    /// Start and finish order of every bootstrap call
    pub fn timeline(&self) -> Vec<BootstrapEvent> {
        self.state.timeline.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Engagement durations requested so far
    pub fn engagements(&self) -> Vec<Duration> {
        self.state.engagements.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn should_fail(&self, call: u64) -> bool {
        self.failing_calls.contains(&call)
            || self.fail_every.map(|n| (call + 1) % n == 0).unwrap_or(false)
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open_context(&self) -> SimulationResult<Arc<dyn SessionContext>> {
        if self.fail_setup {
            return Err(SimulationError::session_setup_error("mock provider refused to start"));
        }
        self.state.contexts_opened.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(MockSessionContext { provider: self.clone() }))
    }
}

#[derive(Debug)]
struct MockSessionContext {
    provider: MockSessionProvider,
}

impl MockSessionContext {
    async fn visit(&self, engagement: Duration) -> SimulationResult<SessionDescriptor> {
        let state = &self.provider.state;
        let call = state.calls.fetch_add(1, Ordering::AcqRel);
        let _in_flight = state.in_flight.enter();
        state.record(BootstrapEvent::Started(call));

        sleep(self.provider.delay + engagement).await;

        state.record(BootstrapEvent::Finished(call));
        if self.provider.should_fail(call) {
            return Err(SimulationError::navigation_error(format!(
                "mock navigation {} timed out",
                call
            )));
        }
        Ok(self.provider.descriptor.clone())
    }
}

#[async_trait]
impl SessionContext for MockSessionContext {
    async fn bootstrap_session(&self) -> SimulationResult<SessionDescriptor> {
        self.visit(Duration::ZERO).await
    }

    async fn bootstrap_session_with_engagement(
        &self,
        duration: Duration,
    ) -> SimulationResult<SessionDescriptor> {
        self.provider
            .state
            .engagements
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(duration);
        self.visit(duration).await
    }

    async fn close(&self) -> SimulationResult<()> {
        self.provider.state.contexts_closed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_injected_failures_follow_call_order() {
        let provider = MockSessionProvider::default().fail_on_call(1).fail_every(3);
        let ctx = provider.open_context().await.unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(ctx.bootstrap_session().await.is_ok());
        }
        assert_eq!(outcomes, vec![true, false, false, true, true, false]);
        assert_eq!(provider.bootstrap_calls(), 6);
        assert_eq!(provider.timeline().len(), 12);
    }

    #[tokio::test]
    async fn test_setup_failure_and_lifecycle_counters() {
        assert!(MockSessionProvider::default().fail_setup().open_context().await.is_err());

        let provider = MockSessionProvider::default();
        let ctx = provider.open_context().await.unwrap();
        ctx.close().await.unwrap();
        assert_eq!(provider.contexts_opened(), 1);
        assert_eq!(provider.contexts_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engagement_is_recorded_and_cookies_returned() {
        let provider = MockSessionProvider::default().with_analytics_cookies("G-XYZ", "11.22", 33);
        let ctx = provider.open_context().await.unwrap();

        let descriptor = ctx.bootstrap_session_with_engagement(Duration::from_secs(5)).await.unwrap();
        assert_eq!(descriptor.cookie("_ga"), Some("GA1.1.11.22"));
        assert_eq!(descriptor.cookie("_ga_XYZ"), Some("GS1.1.33.1.1.0.0.0"));
        assert_eq!(provider.engagements(), vec![Duration::from_secs(5)]);
    }
}
