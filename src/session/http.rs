//! HTTP session bootstrap
//!
//! Visits the target with a plain HTTP client and reports the cookies the
//! final page can see, the document title and the final URL. Every visit gets
//! its own cookie jar, so cookies set on redirect hops are kept and nothing
//! leaks between users. Cookies written by client-side scripts are not seen,
//! so identity resolution will usually fall back to a synthetic identity with
//! this backend.

use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::USER_AGENT;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::session::{SessionContext, SessionCookie, SessionDescriptor, SessionProvider};
use crate::simulation::{RandomSource, SimulationError, SimulationResult};

/// Desktop user agents rotated across visits
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Per-visit timeout
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Session Provider backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    target_url: String,
    timeout: Duration,
    rng: RandomSource,
}

impl HttpSessionProvider {
    /// Provider visiting `target_url`
    pub fn new(target_url: impl Into<String>, rng: RandomSource) -> Self {
        Self { target_url: target_url.into(), timeout: DEFAULT_NAVIGATION_TIMEOUT, rng }
    }

    /// Override the per-visit timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open_context(&self) -> SimulationResult<Arc<dyn SessionContext>> {
        // Visits build their own clients; fail here if none can be built at all
        build_client(self.timeout, Arc::new(Jar::default()))
            .map_err(|e| SimulationError::session_setup_error(e.to_string()))?;

        Ok(Arc::new(HttpSessionContext {
            timeout: self.timeout,
            target_url: self.target_url.clone(),
            rng: self.rng.clone(),
            title_pattern: title_pattern()?,
        }))
    }
}

fn title_pattern() -> SimulationResult<Regex> {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
        .map_err(|e| SimulationError::session_setup_error(e.to_string()))
}

fn build_client(timeout: Duration, jar: Arc<Jar>) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).cookie_provider(jar).build()
}

/// Split a `Cookie` request header (`a=1; b=2`) into cookies
pub fn parse_cookie_header(header: &str) -> Vec<SessionCookie> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| SessionCookie::new(name.trim(), value.trim().trim_matches('"')))
        .collect()
}

#[derive(Debug)]
struct HttpSessionContext {
    timeout: Duration,
    target_url: String,
    rng: RandomSource,
    title_pattern: Regex,
}

impl HttpSessionContext {
    fn extract_title(&self, html: &str) -> String {
        self.title_pattern
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    }

    #[instrument(skip(self), fields(url = %self.target_url))]
    async fn visit(&self) -> SimulationResult<SessionDescriptor> {
        let agent = self.rng.choose(&USER_AGENTS).copied().unwrap_or(USER_AGENTS[0]);

        let jar = Arc::new(Jar::default());
        let client = build_client(self.timeout, Arc::clone(&jar))
            .map_err(|e| SimulationError::navigation_error(e.to_string()))?;

        let response = client
            .get(&self.target_url)
            .header(USER_AGENT, agent)
            .send()
            .await
            .map_err(SimulationError::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SimulationError::navigation_error(format!(
                "{} answered {}",
                self.target_url, status
            )));
        }

        let final_url = response.url().clone();
        let cookies = jar
            .cookies(&final_url)
            .and_then(|header| header.to_str().map(parse_cookie_header).ok())
            .unwrap_or_default();
        let page_location = final_url.to_string();
        let body = response.text().await.map_err(SimulationError::transport_error)?;

        debug!(cookies = cookies.len(), final_url = %page_location, "Visit complete");

        Ok(SessionDescriptor {
            cookies,
            page_title: self.extract_title(&body),
            page_location,
        })
    }
}

#[async_trait]
impl SessionContext for HttpSessionContext {
    async fn bootstrap_session(&self) -> SimulationResult<SessionDescriptor> {
        self.visit().await
    }

    async fn bootstrap_session_with_engagement(
        &self,
        duration: Duration,
    ) -> SimulationResult<SessionDescriptor> {
        let descriptor = self.visit().await?;
        sleep(duration).await;
        Ok(descriptor)
    }

    async fn close(&self) -> SimulationResult<()> {
        Ok(())
    }
}
