//! Enumeration types for the GA4 user simulator
//!
//! This module contains the simulation mode selector and the per-mode
//! constants that bound how hard a run may push the target site and the
//! analytics endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Concurrency ceiling for modes that open sessions against the target site
pub const SESSION_MODE_CONCURRENCY_CEILING: usize = 10;

/// Concurrency ceiling for the event-only mode
pub const PROTOCOL_MODE_CONCURRENCY_CEILING: usize = 20;

/// Batch size for modes that open sessions against the target site
pub const SESSION_MODE_BATCH_SIZE: usize = 10;

/// Batch size for the event-only mode
pub const PROTOCOL_MODE_BATCH_SIZE: usize = 100;

/// How each simulated user is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Full session through the Session Provider; the site's own tag emits the events
    BrowserOnly,
    /// Events sent directly to the Event Sink with a synthesized identity
    ProtocolOnly,
    /// Session bootstrap through the Session Provider, follow-up events through the Event Sink
    Hybrid,
}

impl SimulationMode {
    /// All modes, in CLI listing order
    pub const ALL: [SimulationMode; 3] =
        [SimulationMode::Hybrid, SimulationMode::BrowserOnly, SimulationMode::ProtocolOnly];

    /// Whether units in this mode call the Session Provider
    pub fn uses_session_provider(&self) -> bool {
        matches!(self, SimulationMode::BrowserOnly | SimulationMode::Hybrid)
    }

    /// Whether units in this mode call the Event Sink
    pub fn uses_event_sink(&self) -> bool {
        matches!(self, SimulationMode::ProtocolOnly | SimulationMode::Hybrid)
    }

    /// Hard upper bound on in-flight units, regardless of configuration
    pub fn concurrency_ceiling(&self) -> usize {
        if self.uses_session_provider() {
            SESSION_MODE_CONCURRENCY_CEILING
        } else {
            PROTOCOL_MODE_CONCURRENCY_CEILING
        }
    }

    /// Number of units launched together before waiting for the batch to drain
    pub fn batch_size(&self) -> usize {
        if self.uses_session_provider() {
            SESSION_MODE_BATCH_SIZE
        } else {
            PROTOCOL_MODE_BATCH_SIZE
        }
    }

    /// Short name used on the command line and in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::BrowserOnly => "browser",
            SimulationMode::ProtocolOnly => "mp",
            SimulationMode::Hybrid => "hybrid",
        }
    }

    /// One-line description for help and banners
    pub fn description(&self) -> &'static str {
        match self {
            SimulationMode::BrowserOnly => "Full browser simulation (slowest, most realistic)",
            SimulationMode::ProtocolOnly => "Measurement Protocol only (fastest, partial reporting)",
            SimulationMode::Hybrid => "Browser bootstrap + Measurement Protocol events (recommended)",
        }
    }
}

impl Default for SimulationMode {
    fn default() -> Self {
        SimulationMode::Hybrid
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SimulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hybrid" => Ok(SimulationMode::Hybrid),
            "browser" | "browser_only" | "browser-only" => Ok(SimulationMode::BrowserOnly),
            "mp" | "protocol" | "protocol_only" | "protocol-only" => {
                Ok(SimulationMode::ProtocolOnly)
            }
            _ => Err(format!("Unknown simulation mode: {} (expected hybrid, browser or mp)", s)),
        }
    }
}
