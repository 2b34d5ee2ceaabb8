//! Event Sink contract and in-process fake

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::events::{AnalyticsEvent, EventName};
use crate::simulation::{InFlightGauge, SimulationError, SimulationResult};
use crate::types::UserIdentity;

/// Outcome of one emit call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmitReceipt {
    /// The sink took the event
    pub accepted: bool,
    /// Transport status, when there is one
    pub status: Option<u16>,
    /// Validation messages returned by the sink
    pub messages: Vec<String>,
}

impl EmitReceipt {
    /// Accepted receipt
    pub fn accepted() -> Self {
        Self { accepted: true, ..Default::default() }
    }

    /// Rejected receipt with one message
    pub fn rejected(message: impl Into<String>) -> Self {
        Self { accepted: false, status: None, messages: vec![message.into()] }
    }

    /// Attach a transport status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Turn a rejection into an error naming the event
    pub fn into_result(self, event: &EventName) -> SimulationResult<Self> {
        if self.accepted {
            return Ok(self);
        }
        let reason = match (self.status, self.messages.is_empty()) {
            (_, false) => self.messages.join("; "),
            (Some(status), true) => format!("HTTP {}", status),
            (None, true) => "not accepted".to_string(),
        };
        Err(SimulationError::event_rejected(event.as_str(), reason))
    }
}

/// Factory for run-scoped sink contexts
#[async_trait]
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Prepare for emission; `validate` selects the validation endpoint
    ///
    /// Failing here is a setup failure and aborts the run.
    async fn open_context(&self, validate: bool) -> SimulationResult<Arc<dyn EventSinkContext>>;
}

/// A live emission channel shared by the units of one run
#[async_trait]
pub trait EventSinkContext: Send + Sync + fmt::Debug {
    /// Send one event on behalf of `identity`
    async fn emit(
        &self,
        identity: &UserIdentity,
        event: &AnalyticsEvent,
    ) -> SimulationResult<EmitReceipt>;

    /// Release the channel
    async fn close(&self) -> SimulationResult<()>;
}

/// An emitted event as recorded by [`MockEventSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Identity the event was sent for
    pub identity: UserIdentity,
    /// The event
    pub event: AnalyticsEvent,
    /// Whether the context was opened in validation mode
    pub validate: bool,
}

#[derive(Debug, Default)]
struct SinkState {
    contexts_opened: AtomicU64,
    contexts_closed: AtomicU64,
    calls: AtomicU64,
    in_flight: Arc<InFlightGauge>,
    recorded: Mutex<Vec<RecordedEvent>>,
}

/// Configurable fake Event Sink
#[derive(Debug, Clone, Default)]
pub struct MockEventSink {
    delay: Duration,
    fail_setup: bool,
    failing_calls: HashSet<u64>,
    rejected_names: HashSet<String>,
    state: Arc<SinkState>,
}

impl MockEventSink {
    /// Sink that accepts everything immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Time each emit takes
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make `open_context` fail
    pub fn fail_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Make emit call number `call` (0-based, in start order) fail with a transport-style error
    pub fn fail_on_call(mut self, call: u64) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Report every event called `name` as not accepted
    pub fn reject_event(mut self, name: impl Into<String>) -> Self {
        self.rejected_names.insert(name.into());
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

    /// Emit calls started so far
    pub fn emit_calls(&self) -> u64 {
        self.state.calls.load(Ordering::Acquire)
    }

    /// Most emit calls ever running at once
    pub fn peak_concurrency(&self) -> usize {
        self.state.in_flight.peak()
    }

    /// Accepted events, in completion order
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.state.recorded.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Accepted events with the given name
    pub fn recorded_named(&self, name: &EventName) -> Vec<RecordedEvent> {
        self.recorded().into_iter().filter(|r| &r.event.name == name).collect()
    }
}

#[async_trait]
impl EventSink for MockEventSink {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open_context(&self, validate: bool) -> SimulationResult<Arc<dyn EventSinkContext>> {
        if self.fail_setup {
            return Err(SimulationError::event_sink_setup_error("mock sink refused to start"));
        }
        self.state.contexts_opened.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(MockSinkContext { sink: self.clone(), validate }))
    }
}

#[derive(Debug)]
struct MockSinkContext {
    sink: MockEventSink,
    validate: bool,
}

#[async_trait]
impl EventSinkContext for MockSinkContext {
    async fn emit(
        &self,
        identity: &UserIdentity,
        event: &AnalyticsEvent,
    ) -> SimulationResult<EmitReceipt> {
        let state = &self.sink.state;
        let call = state.calls.fetch_add(1, Ordering::AcqRel);
        let _in_flight = state.in_flight.enter();

        sleep(self.sink.delay).await;

        if self.sink.failing_calls.contains(&call) {
            return Err(SimulationError::IoError(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("mock emit {} dropped", call),
            )));
        }
        if self.sink.rejected_names.contains(event.name.as_str()) {
            return Ok(EmitReceipt::rejected(format!("{} is not allowed", event.name)).with_status(400));
        }

        state.recorded.lock().unwrap_or_else(|p| p.into_inner()).push(RecordedEvent {
            identity: identity.clone(),
            event: event.clone(),
            validate: self.validate,
        });
        Ok(EmitReceipt::accepted().with_status(204))
    }

    async fn close(&self) -> SimulationResult<()> {
        self.sink.state.contexts_closed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_into_result() {
        let name = EventName::PageView;
        assert!(EmitReceipt::accepted().into_result(&name).is_ok());

        let err = EmitReceipt::default().with_status(500).into_result(&name).unwrap_err();
        assert_eq!(err.to_string(), "Event page_view was rejected: HTTP 500");

        let err = EmitReceipt::rejected("missing client_id").into_result(&name).unwrap_err();
        assert!(err.to_string().ends_with("missing client_id"));
    }

    #[tokio::test]
    async fn test_mock_records_and_rejects() {
        let sink = MockEventSink::new().reject_event("first_visit");
        let ctx = sink.open_context(true).await.unwrap();
        let identity = UserIdentity::new("1.2", 3);

        let ok = ctx.emit(&identity, &AnalyticsEvent::session_start("https://e.x", "Home")).await.unwrap();
        assert!(ok.accepted);
        let rejected = ctx.emit(&identity, &AnalyticsEvent::first_visit()).await.unwrap();
        assert!(!rejected.accepted);

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].validate);
        assert_eq!(recorded[0].identity, identity);
        assert_eq!(sink.emit_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_failure_and_setup_failure() {
        let sink = MockEventSink::new().fail_on_call(0);
        let ctx = sink.open_context(false).await.unwrap();
        let result = ctx.emit(&UserIdentity::new("1.2", 3), &AnalyticsEvent::first_visit()).await;
        assert!(matches!(result, Err(SimulationError::IoError(_))));

        let err = MockEventSink::new().fail_setup().open_context(false).await.unwrap_err();
        assert!(err.is_setup_failure());
    }
}
