//! Simulation orchestration and control
//!
//! This module contains the orchestrator, the batch scheduler, admission
//! control, the per-mode strategies, statistics collection, and the injected
//! clock and random source.
//!
//! # Overview
//!
//! - **UserSimulator**: entry point; clamps, sizes the gate, opens collaborator
//!   contexts and returns [`SimulationStats`]
//! - **BatchScheduler**: runs units batch by batch, joining each batch
//! - **AdmissionController**: bounded concurrency gate shared by all units
//! - **ModeStrategy**: protocol-only, browser-only and hybrid user workflows
//! - **StatsAggregator**: lock-free run counters
//! - **SimulationError**: setup failures and unit failures
//!
//! # Usage Example
//!
//! ```rust
//! use ga4_user_simulator::events::MockEventSink;
//! use ga4_user_simulator::session::MockSessionProvider;
//! use ga4_user_simulator::simulation::*;
//! use ga4_user_simulator::types::*;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let simulator = UserSimulator::new(
//!     SimulationConfig::default(),
//!     Arc::new(MockSessionProvider::default()),
//!     Arc::new(MockEventSink::new()),
//! )
//! .unwrap();
//!
//! let stats = simulator.simulate(3, SimulationMode::ProtocolOnly, false).await.unwrap();
//! assert_eq!(stats.users_created, 3);
//! assert_eq!(stats.events_sent, 12);
//! # });
//! ```

pub mod admission;
pub mod clock;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod random;
pub mod scheduler;
pub mod statistics;
pub mod strategy;

// Re-export all public types for convenience
pub use admission::*;
pub use clock::*;
pub use error::*;
pub use logging::*;
pub use orchestrator::*;
pub use random::*;
pub use scheduler::*;
pub use statistics::*;
pub use strategy::*;
