//! Error types and handling
//!
//! This module contains error types for the simulation. Errors fall in two
//! classes: setup failures, which abort a run before any batch starts, and
//! unit failures, which are absorbed by the unit that hit them and counted.

use thiserror::Error;

/// Errors that can occur during simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigurationError(String),

    /// Session Provider context could not be opened
    #[error("Session provider setup failed: {0}")]
    SessionSetupError(String),

    /// Event Sink context could not be opened
    #[error("Event sink setup failed: {0}")]
    EventSinkSetupError(String),

    /// Session bootstrap failed (navigation, timeout, closed context)
    #[error("Session bootstrap failed: {0}")]
    NavigationError(String),

    /// The Event Sink did not accept an event
    #[error("Event {event} was rejected: {reason}")]
    EventRejected {
        /// Name of the rejected event
        event: String,
        /// Reason reported by the sink
        reason: String,
    },

    /// HTTP transport error; build with [`SimulationError::transport_error`]
    #[error("Transport error: {0}")]
    TransportError(reqwest::Error),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The admission gate was closed while a unit waited on it
    #[error("Admission gate closed")]
    AdmissionClosed,

    /// A unit task panicked or was aborted
    #[error("Unit task failed: {0}")]
    TaskJoinError(String),
}

impl From<tokio::task::JoinError> for SimulationError {
    fn from(error: tokio::task::JoinError) -> Self {
        SimulationError::TaskJoinError(error.to_string())
    }
}

impl From<crate::types::ConfigValidationError> for SimulationError {
    fn from(error: crate::types::ConfigValidationError) -> Self {
        SimulationError::ConfigurationError(error.to_string())
    }
}

impl SimulationError {
    /// Create a configuration error
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a session setup error
    pub fn session_setup_error(msg: impl Into<String>) -> Self {
        Self::SessionSetupError(msg.into())
    }

    /// Create an event sink setup error
    pub fn event_sink_setup_error(msg: impl Into<String>) -> Self {
        Self::EventSinkSetupError(msg.into())
    }

    /// Create a navigation error
    pub fn navigation_error(msg: impl Into<String>) -> Self {
        Self::NavigationError(msg.into())
    }

    /// Wrap a transport error, dropping the request URL it carries
    ///
    /// Measurement Protocol URLs hold the API secret in their query string.
    pub fn transport_error(error: reqwest::Error) -> Self {
        Self::TransportError(error.without_url())
    }

    /// Create an event rejection error
    pub fn event_rejected(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EventRejected { event: event.into(), reason: reason.into() }
    }

    /// Whether this error aborts the whole run
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            SimulationError::ConfigurationError(_)
                | SimulationError::SessionSetupError(_)
                | SimulationError::EventSinkSetupError(_)
        )
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors are confined to the unit that raised them.
    pub fn is_recoverable(&self) -> bool {
        !self.is_setup_failure()
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            SimulationError::ConfigurationError(_) => "Configuration",
            SimulationError::SessionSetupError(_) => "Session Setup",
            SimulationError::EventSinkSetupError(_) => "Event Sink Setup",
            SimulationError::NavigationError(_) => "Navigation",
            SimulationError::EventRejected { .. } => "Event Rejected",
            SimulationError::TransportError(_) => "Transport",
            SimulationError::IoError(_) => "IO",
            SimulationError::AdmissionClosed => "Admission",
            SimulationError::TaskJoinError(_) => "Task",
        }
    }
}

/// Result type for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let config_error = SimulationError::configuration_error("Invalid config");
        assert!(matches!(config_error, SimulationError::ConfigurationError(_)));
        assert_eq!(config_error.to_string(), "Configuration validation failed: Invalid config");

        let rejected = SimulationError::event_rejected("page_view", "HTTP 400");
        assert_eq!(rejected.to_string(), "Event page_view was rejected: HTTP 400");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let sim_error: SimulationError = io_error.into();
        assert!(matches!(sim_error, SimulationError::IoError(_)));
        assert!(sim_error.is_recoverable());
    }

    #[test]
    fn test_error_from_validation_error() {
        let error: SimulationError = crate::types::ConfigValidationError::InvalidDailyLimit(0).into();
        assert!(matches!(error, SimulationError::ConfigurationError(_)));
        assert!(error.is_setup_failure());
    }

    #[test]
    fn test_setup_failures_are_fatal() {
        assert!(SimulationError::session_setup_error("no browser").is_setup_failure());
        assert!(SimulationError::event_sink_setup_error("no client").is_setup_failure());
        assert!(!SimulationError::navigation_error("timeout").is_setup_failure());
        assert!(!SimulationError::event_rejected("x", "y").is_setup_failure());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(SimulationError::configuration_error("x").category(), "Configuration");
        assert_eq!(SimulationError::session_setup_error("x").category(), "Session Setup");
        assert_eq!(SimulationError::event_sink_setup_error("x").category(), "Event Sink Setup");
        assert_eq!(SimulationError::navigation_error("x").category(), "Navigation");
        assert_eq!(SimulationError::event_rejected("x", "y").category(), "Event Rejected");
        assert_eq!(SimulationError::TaskJoinError("boom".into()).category(), "Task");
        assert_eq!(SimulationError::AdmissionClosed.category(), "Admission");
    }

    #[tokio::test]
    async fn test_error_from_panicked_task() {
        let joined = tokio::spawn(async { panic!("unit exploded") }).await;
        let error = SimulationError::from(joined.unwrap_err());
        assert!(matches!(error, SimulationError::TaskJoinError(_)));
        assert_eq!(error.category(), "Task");
        assert!(error.to_string().contains("panicked"));
        assert!(error.is_recoverable());
    }
}
