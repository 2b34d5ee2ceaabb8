//! GA4 User Simulator
//!
//! Generates synthetic analytics traffic: simulated users either bootstrap a
//! real session against the target site, send their events straight to the
//! GA4 Measurement Protocol, or both.
//!
//! # Overview
//!
//! The heart of the library is a concurrent simulation orchestrator. A run
//! partitions the requested users into batches, admits units through a
//! bounded concurrency gate, runs one per-mode workflow per user, isolates
//! and counts failures, and returns run statistics.
//!
//! ## Key Features
//!
//! - **Three modes**: protocol-only, browser-only and hybrid workflows
//! - **Admission control**: concurrency capped per mode (10 with sessions, 20 without)
//! - **Batching**: each batch is joined before the next starts
//! - **Identity resolution**: client and session IDs from analytics cookies,
//!   with a clock-derived fallback
//! - **Pluggable collaborators**: Session Provider and Event Sink traits with
//!   HTTP, Measurement Protocol and in-process backends
//! - **Reproducible runs**: injected clock and seeded random source
//!
//! ## Quick Start
//!
//! ```rust
//! use ga4_user_simulator::*;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = SimulationConfig { max_daily_users: 25, ..Default::default() };
//! let simulator = UserSimulator::new(
//!     config,
//!     Arc::new(MockSessionProvider::default()),
//!     Arc::new(MockEventSink::new()),
//! )?;
//!
//! let stats = simulator.simulate(40, SimulationMode::ProtocolOnly, false).await?;
//! assert_eq!(stats.users_created + stats.errors, 25);
//! # Ok::<(), SimulationError>(())
//! # }).unwrap();
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: Configuration, modes and identifiers
//! - [`session`]: Session Provider contract, descriptors and identity resolution
//! - [`events`]: Event model, Event Sink contract and Measurement Protocol client
//! - [`simulation`]: Orchestrator, scheduler, admission, strategies and statistics
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ UserSimulator                                            │
//! │   clamp ─► AdmissionController ─► BatchScheduler         │
//! │                                      │ per batch         │
//! │                                      ▼                   │
//! │                         units ─► ModeStrategy            │
//! │                                   │            │         │
//! └───────────────────────────────────┼────────────┼─────────┘
//!                                     ▼            ▼
//!                           SessionContext   EventSinkContext
//!                                 │
//!                                 ▼
//!                          IdentityResolver
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod events;
pub mod session;
pub mod simulation;
pub mod types;

// Core types and configuration
pub use types::{
    CliArgs, ConfigError, ConfigValidationError, Ga4Config, RunId, SimulationConfig,
    SimulationMode, UserIdentity,
};

// Session bootstrap
pub use session::{
    HttpSessionProvider, IdentityResolver, MockSessionProvider, SessionContext, SessionDescriptor,
    SessionProvider,
};

// Events
pub use events::{
    AnalyticsEvent, EventName, EventParams, EventSink, EventSinkContext, MeasurementProtocolSink,
    MockEventSink,
};

// Simulation
pub use simulation::{
    AdmissionController, BatchScheduler, LoggingConfig, ModeStrategy, ProgressCallback,
    RandomSource, SimulationError, SimulationResult, SimulationStats, StatsAggregator,
    UserSimulator,
};
