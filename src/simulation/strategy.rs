//! Per-user work for each simulation mode
//!
//! A strategy turns one unit index into the sequence of collaborator calls
//! that make up one simulated user. Strategies report how many events the
//! unit accounts for; counting and progress are left to the caller so that a
//! failed unit contributes nothing but an error.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::debug;

use crate::events::{page_title_for_path, AnalyticsEvent, EventSinkContext};
use crate::session::{IdentityResolver, SessionContext};
use crate::simulation::{RandomSource, SharedClock, SimulationResult};
use crate::types::{SimulationConfig, SimulationMode, UserIdentity};

/// Events a bootstrapped session is assumed to trigger on its own
/// (`session_start`, `first_visit`, `page_view`)
pub const NOMINAL_BOOTSTRAP_EVENTS: u64 = 3;

/// Events sent by one protocol-only user
pub const PROTOCOL_EVENTS_PER_USER: u64 = 4;

/// Paths visited after the landing page in hybrid mode
pub const SITE_PAGES: [&str; 5] = ["/about", "/contact", "/blog", "/projects", "/resume"];

/// Pause between hybrid page views, in milliseconds
pub const PAGE_VIEW_PAUSE_MS: (u64, u64) = (100, 500);

/// Result of one successful unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitReport {
    /// Events the unit accounts for
    pub events: u64,
}

/// One simulated user's workflow
#[async_trait]
pub trait ModeStrategy: Send + Sync + fmt::Debug {
    /// Mode this strategy implements
    fn mode(&self) -> SimulationMode;

    /// Run the unit for user `index` of `total`
    async fn run_unit(&self, index: u64, total: u64) -> SimulationResult<UnitReport>;
}

/// Shared inputs of every strategy
#[derive(Debug, Clone)]
pub struct UnitEnvironment {
    /// Run configuration
    pub config: Arc<SimulationConfig>,
    /// Random draws
    pub rng: RandomSource,
    /// Wall clock
    pub clock: SharedClock,
}

impl UnitEnvironment {
    fn session_engagement_ms(&self) -> u64 {
        let (low, high) = self.config.session_duration_range_ms();
        self.rng.range_u64(low, high)
    }

    fn page_engagement_ms(&self) -> u64 {
        let (low, high) = self.config.session_duration_range_ms();
        self.rng.range_u64(low / 2, high / 2)
    }

    fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.config.target_url.trim_end_matches('/'), path)
    }
}

async fn emit_accepted(
    sink: &dyn EventSinkContext,
    identity: &UserIdentity,
    event: &AnalyticsEvent,
) -> SimulationResult<()> {
    sink.emit(identity, event).await?.into_result(&event.name)?;
    Ok(())
}

/// Events only, through the Event Sink
#[derive(Debug)]
pub struct ProtocolOnlyStrategy {
    sink: Arc<dyn EventSinkContext>,
    env: UnitEnvironment,
}

impl ProtocolOnlyStrategy {
    /// Strategy emitting through `sink`
    pub fn new(sink: Arc<dyn EventSinkContext>, env: UnitEnvironment) -> Self {
        Self { sink, env }
    }

    /// Fresh identity for unit `index`: `<secs><index>.<10 random digits>`
    pub fn synthesize_identity(&self, index: u64) -> UserIdentity {
        let secs = self.env.clock.unix_seconds();
        let client_id = format!("{}{}.{}", secs, index, self.env.rng.client_suffix());
        UserIdentity::new(client_id, secs)
    }
}

#[async_trait]
impl ModeStrategy for ProtocolOnlyStrategy {
    fn mode(&self) -> SimulationMode {
        SimulationMode::ProtocolOnly
    }

    async fn run_unit(&self, index: u64, _total: u64) -> SimulationResult<UnitReport> {
        let identity = self.synthesize_identity(index);
        let target = &self.env.config.target_url;
        let engagement = self.env.session_engagement_ms();

        let events = [
            AnalyticsEvent::session_start(target.as_str(), "Home"),
            AnalyticsEvent::first_visit(),
            AnalyticsEvent::page_view(target.as_str(), "Home", None, engagement),
            AnalyticsEvent::user_engagement(engagement, target.as_str()),
        ];
        for event in &events {
            emit_accepted(self.sink.as_ref(), &identity, event).await?;
        }

        debug!(index, client_id = %identity.client_id, "Protocol user sent");
        Ok(UnitReport { events: PROTOCOL_EVENTS_PER_USER })
    }
}

/// Sessions only, through the Session Provider
#[derive(Debug)]
pub struct BrowserOnlyStrategy {
    sessions: Arc<dyn SessionContext>,
    env: UnitEnvironment,
}

impl BrowserOnlyStrategy {
    /// Strategy bootstrapping through `sessions`
    pub fn new(sessions: Arc<dyn SessionContext>, env: UnitEnvironment) -> Self {
        Self { sessions, env }
    }
}

#[async_trait]
impl ModeStrategy for BrowserOnlyStrategy {
    fn mode(&self) -> SimulationMode {
        SimulationMode::BrowserOnly
    }

    async fn run_unit(&self, index: u64, _total: u64) -> SimulationResult<UnitReport> {
        let (low, high) = self.env.config.session_duration_range_ms();
        let engagement = self.env.rng.duration_ms(low, high);

        let descriptor = self.sessions.bootstrap_session_with_engagement(engagement).await?;

        debug!(index, page = %descriptor.page_location, "Browser user engaged for {:?}", engagement);
        Ok(UnitReport { events: NOMINAL_BOOTSTRAP_EVENTS })
    }
}

/// One real session, then extra page views through the Event Sink
#[derive(Debug)]
pub struct HybridStrategy {
    sessions: Arc<dyn SessionContext>,
    sink: Arc<dyn EventSinkContext>,
    resolver: IdentityResolver,
    container_hint: String,
    env: UnitEnvironment,
}

impl HybridStrategy {
    /// Strategy using both collaborators
    ///
    /// `container_hint` names the session cookie (the measurement ID).
    pub fn new(
        sessions: Arc<dyn SessionContext>,
        sink: Arc<dyn EventSinkContext>,
        resolver: IdentityResolver,
        container_hint: impl Into<String>,
        env: UnitEnvironment,
    ) -> Self {
        Self { sessions, sink, resolver, container_hint: container_hint.into(), env }
    }
}

#[async_trait]
impl ModeStrategy for HybridStrategy {
    fn mode(&self) -> SimulationMode {
        SimulationMode::Hybrid
    }

    async fn run_unit(&self, index: u64, _total: u64) -> SimulationResult<UnitReport> {
        let descriptor = self.sessions.bootstrap_session().await?;
        let identity = self.resolver.resolve(&descriptor, &self.container_hint);
        let mut events = NOMINAL_BOOTSTRAP_EVENTS;

        let (min_pages, max_pages) = self.env.config.additional_pages_range();
        let pages = self.env.rng.range_u32(min_pages, max_pages);
        let mut referrer = descriptor.page_location;

        for _ in 0..pages {
            let path = self.env.rng.choose(&SITE_PAGES).copied().unwrap_or("/");
            let location = self.env.page_url(path);
            let event = AnalyticsEvent::page_view(
                location.as_str(),
                page_title_for_path(path),
                Some(referrer).filter(|r| !r.is_empty()),
                self.env.page_engagement_ms(),
            );
            emit_accepted(self.sink.as_ref(), &identity, &event).await?;
            events += 1;
            referrer = location;

            let (low, high) = PAGE_VIEW_PAUSE_MS;
            sleep(self.env.rng.duration_ms(low, high)).await;
        }

        let closing = AnalyticsEvent::user_engagement(
            self.env.session_engagement_ms(),
            self.env.config.target_url.as_str(),
        );
        emit_accepted(self.sink.as_ref(), &identity, &closing).await?;
        events += 1;

        debug!(index, identity = %identity, pages, "Hybrid user sent");
        Ok(UnitReport { events })
    }
}
