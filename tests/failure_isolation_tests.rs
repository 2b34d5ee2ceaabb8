//! Integration tests for failure isolation and cancellation
//!
//! A failing unit must only cost itself; a failing collaborator setup must
//! abort the run before any unit starts; an interrupted run must stop cleanly
//! between batches and report what it finished.

use ga4_user_simulator::events::EventName;
use ga4_user_simulator::*;
use std::sync::Arc;
use std::time::Duration;

fn config(duration_ms: u64) -> SimulationConfig {
    SimulationConfig {
        min_session_duration_ms: duration_ms,
        max_session_duration_ms: duration_ms,
        seed: Some(5),
        ..Default::default()
    }
}

/// Test that one failing bootstrap fails only its own unit
#[tokio::test(start_paused = true)]
async fn test_single_bootstrap_failure_is_isolated() {
    let sessions = MockSessionProvider::default().fail_on_call(3);
    let sink = MockEventSink::new();
    let sim = UserSimulator::new(config(1_000), Arc::new(sessions.clone()), Arc::new(sink.clone()))
        .unwrap();

    let stats = sim.simulate(12, SimulationMode::Hybrid, false).await.unwrap();

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.users_created, 11);
    assert_eq!(sessions.bootstrap_calls(), 12);
    assert_eq!(sink.recorded_named(&EventName::UserEngagement).len(), 11);
    assert!((stats.success_percentage() - 11.0 / 12.0 * 100.0).abs() < 1e-9);
}

/// Test that recurring failures are all counted
#[tokio::test(start_paused = true)]
async fn test_recurring_bootstrap_failures() {
    let sessions = MockSessionProvider::default().fail_every(4);
    let sim = UserSimulator::new(
        config(500),
        Arc::new(sessions),
        Arc::new(MockEventSink::new()),
    )
    .unwrap();

    let stats = sim.simulate(20, SimulationMode::BrowserOnly, false).await.unwrap();

    assert_eq!(stats.errors, 5);
    assert_eq!(stats.users_created, 15);
    assert_eq!(stats.events_sent, 45);
}

/// Test that an event the sink does not accept fails the unit
#[tokio::test(start_paused = true)]
async fn test_rejected_event_fails_protocol_units() {
    let sink = MockEventSink::new().reject_event("first_visit");
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(MockSessionProvider::default()),
        Arc::new(sink.clone()),
    )
    .unwrap();

    let stats = sim.simulate(6, SimulationMode::ProtocolOnly, false).await.unwrap();

    assert_eq!(stats.errors, 6);
    assert_eq!(stats.users_created, 0);
    assert_eq!(stats.events_sent, 0);
    // session_start was accepted before each rejection
    assert_eq!(sink.recorded().len(), 6);
    assert!(stats.generate_summary_output().contains("Errors"));
}

/// Test that a dropped emit fails just one unit
#[tokio::test(start_paused = true)]
async fn test_transport_error_is_isolated() {
    let sink = MockEventSink::new().fail_on_call(0);
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(MockSessionProvider::default()),
        Arc::new(sink),
    )
    .unwrap();

    let stats = sim.simulate(10, SimulationMode::ProtocolOnly, false).await.unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.users_created, 9);
    assert_eq!(stats.events_sent, 36);
}

/// Test that a session setup failure aborts the run before anything else opens
#[tokio::test(start_paused = true)]
async fn test_session_setup_failure_is_fatal() {
    let sink = MockEventSink::new();
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(MockSessionProvider::default().fail_setup()),
        Arc::new(sink.clone()),
    )
    .unwrap();

    let err = sim.simulate(5, SimulationMode::Hybrid, false).await.unwrap_err();

    assert!(err.is_setup_failure());
    assert!(!err.is_recoverable());
    assert_eq!(sink.contexts_opened(), 0);
    assert_eq!(sink.emit_calls(), 0);
}

/// Test that protocol-only runs never touch a broken Session Provider
#[tokio::test(start_paused = true)]
async fn test_protocol_only_ignores_session_provider() {
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(MockSessionProvider::default().fail_setup()),
        Arc::new(MockEventSink::new()),
    )
    .unwrap();

    let stats = sim.simulate(5, SimulationMode::ProtocolOnly, false).await.unwrap();
    assert_eq!(stats.users_created, 5);
}

/// Test that browser-only runs never touch a broken Event Sink
#[tokio::test(start_paused = true)]
async fn test_browser_only_ignores_event_sink() {
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(MockSessionProvider::default()),
        Arc::new(MockEventSink::new().fail_setup()),
    )
    .unwrap();

    let stats = sim.simulate(5, SimulationMode::BrowserOnly, false).await.unwrap();
    assert_eq!(stats.users_created, 5);
}

/// Test that units waiting for admission are abandoned on cancellation
#[tokio::test(start_paused = true)]
async fn test_cancellation_abandons_waiting_units() {
    let sessions = MockSessionProvider::default();
    let sim = UserSimulator::new(
        SimulationConfig { max_concurrent_users: 2, ..config(1_000) },
        Arc::new(sessions.clone()),
        Arc::new(MockEventSink::new()),
    )
    .unwrap();

    let cancel = sim.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });

    let stats = sim.simulate(10, SimulationMode::BrowserOnly, false).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.users_created, 2);
    assert_eq!(stats.errors, 0);
    assert_eq!(sessions.bootstrap_calls(), 2);
    assert_eq!(sessions.contexts_closed(), 1);
    assert!(stats.generate_summary_output().contains("Simulation Interrupted"));
}

/// Test that cancellation lets the current batch finish and skips the rest
#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_between_batches() {
    let sessions = MockSessionProvider::default();
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(sessions.clone()),
        Arc::new(MockEventSink::new()),
    )
    .unwrap();

    let cancel = sim.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });

    let stats = sim.simulate(30, SimulationMode::BrowserOnly, false).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.users_created, 10);
    assert_eq!(sessions.bootstrap_calls(), 10);
}

/// Test that a token cancelled before the run produces an empty, interrupted run
#[tokio::test(start_paused = true)]
async fn test_pre_cancelled_run() {
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let sink = MockEventSink::new();
    let sim = UserSimulator::new(
        config(1_000),
        Arc::new(MockSessionProvider::default()),
        Arc::new(sink.clone()),
    )
    .unwrap()
    .with_cancellation(cancel);

    let stats = sim.simulate(8, SimulationMode::ProtocolOnly, false).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.units_completed(), 0);
    assert_eq!(sink.emit_calls(), 0);
    assert_eq!(sink.contexts_closed(), 1);
}

/// Test that a cancelled run does not leave later runs interrupted
#[tokio::test(start_paused = true)]
async fn test_run_after_cancelled_run_completes() {
    let sessions = MockSessionProvider::default();
    let sim = UserSimulator::new(
        SimulationConfig { max_concurrent_users: 2, ..config(1_000) },
        Arc::new(sessions.clone()),
        Arc::new(MockEventSink::new()),
    )
    .unwrap();

    let first_run_token = sim.cancellation_token();
    let cancel = first_run_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });
    let first = sim.simulate(6, SimulationMode::BrowserOnly, false).await.unwrap();
    assert!(first.cancelled);
    assert_eq!(first.users_created, 2);

    assert!(!sim.cancellation_token().is_cancelled());
    let second = sim.simulate(6, SimulationMode::BrowserOnly, false).await.unwrap();
    assert!(!second.cancelled);
    assert_eq!(second.users_created, 6);
    assert_eq!(second.errors, 0);
    assert!(first_run_token.is_cancelled());
}
