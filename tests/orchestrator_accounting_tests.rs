//! Integration tests for run accounting
//!
//! These tests drive full runs through in-process collaborators and check the
//! statistics the orchestrator reports against what the collaborators saw.

use ga4_user_simulator::events::EventName;
use ga4_user_simulator::*;
use std::sync::{Arc, Mutex};

fn quick_config() -> SimulationConfig {
    SimulationConfig {
        min_session_duration_ms: 1_000,
        max_session_duration_ms: 2_000,
        seed: Some(7),
        ..Default::default()
    }
}

fn simulator(config: SimulationConfig) -> (UserSimulator, MockSessionProvider, MockEventSink) {
    let sessions = MockSessionProvider::default();
    let sink = MockEventSink::new();
    let sim = UserSimulator::new(config, Arc::new(sessions.clone()), Arc::new(sink.clone())).unwrap();
    (sim, sessions, sink)
}

/// Test that every admitted unit is either created or an error, per mode
#[tokio::test(start_paused = true)]
async fn test_units_are_fully_accounted_in_every_mode() {
    for mode in SimulationMode::ALL {
        let (sim, _, _) = simulator(quick_config());
        let stats = sim.simulate(23, mode, false).await.unwrap();

        assert_eq!(stats.users_created + stats.errors, 23, "mode {}", mode);
        assert_eq!(stats.units_requested, 23);
        assert_eq!(stats.mode, mode);
        assert!(!stats.cancelled);
        assert!(stats.end_time.is_some());
    }
}

/// Test that protocol-only users are worth four events each
#[tokio::test(start_paused = true)]
async fn test_protocol_only_event_count() {
    let (sim, sessions, sink) = simulator(quick_config());
    let stats = sim.simulate(30, SimulationMode::ProtocolOnly, false).await.unwrap();

    assert_eq!(stats.users_created, 30);
    assert_eq!(stats.events_sent, 120);
    assert_eq!(sink.recorded().len(), 120);
    assert_eq!(sink.recorded_named(&EventName::FirstVisit).len(), 30);
    assert_eq!(sessions.bootstrap_calls(), 0);
}

/// Test that browser-only users are worth the nominal three events
#[tokio::test(start_paused = true)]
async fn test_browser_only_event_count() {
    let (sim, sessions, sink) = simulator(quick_config());
    let stats = sim.simulate(12, SimulationMode::BrowserOnly, false).await.unwrap();

    assert_eq!(stats.users_created, 12);
    assert_eq!(stats.events_sent, 36);
    assert_eq!(sessions.bootstrap_calls(), 12);
    assert_eq!(sink.contexts_opened(), 0);
    assert_eq!(sink.emit_calls(), 0);
}

/// Test that hybrid users count the bootstrap plus every accepted sink event
#[tokio::test(start_paused = true)]
async fn test_hybrid_event_count() {
    let (sim, sessions, sink) = simulator(quick_config());
    let stats = sim.simulate(15, SimulationMode::Hybrid, false).await.unwrap();

    assert_eq!(stats.users_created, 15);
    assert_eq!(sessions.bootstrap_calls(), 15);
    assert_eq!(stats.events_sent, 3 * 15 + sink.recorded().len() as u64);
    // One closing engagement per user
    assert_eq!(sink.recorded_named(&EventName::UserEngagement).len(), 15);
    assert!(sink.recorded_named(&EventName::PageView).len() <= 15 * 4);
}

/// Test that requests above the daily ceiling are clamped
#[tokio::test(start_paused = true)]
async fn test_daily_ceiling_clamps_request() {
    let config = SimulationConfig { max_daily_users: 15, ..quick_config() };
    let (sim, _, sink) = simulator(config);
    let stats = sim.simulate(40, SimulationMode::ProtocolOnly, false).await.unwrap();

    assert_eq!(stats.units_requested, 15);
    assert_eq!(stats.users_created, 15);
    assert_eq!(sink.recorded_named(&EventName::SessionStart).len(), 15);
}

/// Test that progress is reported once per successful unit
#[tokio::test(start_paused = true)]
async fn test_progress_reports_every_success() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let progress: ProgressCallback = Arc::new(move |current, total| {
        seen.lock().unwrap().push((current, total));
    });

    let (sim, _, _) = simulator(quick_config());
    let sim = sim.with_progress(progress);
    sim.simulate(7, SimulationMode::Hybrid, false).await.unwrap();

    let mut calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 7);
    assert!(calls.iter().all(|(_, total)| *total == 7));
    calls.sort();
    let currents: Vec<u64> = calls.iter().map(|(current, _)| *current).collect();
    assert_eq!(currents, (1..=7).collect::<Vec<_>>());
}

/// Test that the debug flag opens the sink in validation mode
#[tokio::test(start_paused = true)]
async fn test_debug_flag_selects_validation() {
    let (sim, _, sink) = simulator(quick_config());
    sim.simulate(2, SimulationMode::ProtocolOnly, true).await.unwrap();

    let recorded = sink.recorded();
    assert_eq!(recorded.len(), 8);
    assert!(recorded.iter().all(|r| r.validate));
}

/// Test that contexts are opened once and closed once per run
#[tokio::test(start_paused = true)]
async fn test_contexts_are_released_after_run() {
    let (sim, sessions, sink) = simulator(quick_config());
    sim.simulate(25, SimulationMode::Hybrid, false).await.unwrap();
    sim.simulate(5, SimulationMode::Hybrid, false).await.unwrap();

    assert_eq!(sessions.contexts_opened(), 2);
    assert_eq!(sessions.contexts_closed(), 2);
    assert_eq!(sink.contexts_opened(), 2);
    assert_eq!(sink.contexts_closed(), 2);
}

/// Test that the statistics survive a JSON round trip for `--stats-output`
#[tokio::test(start_paused = true)]
async fn test_stats_serialize_for_output() {
    let (sim, _, _) = simulator(quick_config());
    let stats = sim.simulate(4, SimulationMode::ProtocolOnly, false).await.unwrap();

    let json = serde_json::to_string(&stats).unwrap();
    let restored: SimulationStats = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.users_created, 4);
    assert_eq!(restored.events_sent, 16);
    assert_eq!(restored.run_id, stats.run_id);
    assert!(stats.generate_summary_output().contains("Simulation Complete!"));
}
