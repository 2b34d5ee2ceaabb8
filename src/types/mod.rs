//! Core types and identifiers for the GA4 user simulator
//!
//! This module contains fundamental types, identifiers, and configuration structures
//! used throughout the simulation system.
//!
//! # Overview
//!
//! - **Identifiers**: run identifiers and the per-visitor [`UserIdentity`]
//! - **Enums**: the [`SimulationMode`] selector and its per-mode limits
//! - **Configuration**: simulation configuration with validation and CLI support
//!
//! # Usage Example
//!
//! ```rust
//! use ga4_user_simulator::types::*;
//!
//! let identity = UserIdentity::new("1712345678.123456789", 1712345678);
//! assert!(identity.is_complete());
//!
//! let mode: SimulationMode = "hybrid".parse().unwrap();
//! assert_eq!(mode.concurrency_ceiling(), 10);
//!
//! let config = SimulationConfig {
//!     max_daily_users: 250,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod enums;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use enums::*;
pub use identifiers::*;
