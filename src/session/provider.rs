//! Session Provider contract
//!
//! A provider owns whatever environment is needed to visit the target site (a
//! browser, an HTTP client). The orchestrator opens one context per run and
//! shares it across every unit, so contexts must tolerate concurrent use.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::session::SessionDescriptor;
use crate::simulation::SimulationResult;

/// Factory for run-scoped session contexts
#[async_trait]
pub trait SessionProvider: Send + Sync + fmt::Debug {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Start the underlying environment
    ///
    /// Failing here is a setup failure and aborts the run.
    async fn open_context(&self) -> SimulationResult<Arc<dyn SessionContext>>;
}

/// A live session environment shared by the units of one run
#[async_trait]
pub trait SessionContext: Send + Sync + fmt::Debug {
    /// Visit the target and return what the visit left behind
    async fn bootstrap_session(&self) -> SimulationResult<SessionDescriptor>;

    /// Visit the target and stay engaged for `duration` before reporting
    async fn bootstrap_session_with_engagement(
        &self,
        duration: Duration,
    ) -> SimulationResult<SessionDescriptor>;

    /// Tear the environment down
    async fn close(&self) -> SimulationResult<()>;
}
