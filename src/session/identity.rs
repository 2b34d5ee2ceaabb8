//! Identity resolution
//!
//! Turns a [`SessionDescriptor`] into a [`UserIdentity`]. The client ID comes
//! from the `_ga` cookie (`GA1.1.<client>.<timestamp>`), the session ID from the
//! `_ga_<container>` cookie (`GS1.1.<session>...`). Whatever cannot be
//! extracted is synthesized from the clock, so resolution never fails.

use regex::Regex;
use tracing::debug;

use crate::session::SessionDescriptor;
use crate::simulation::{SharedClock, SimulationError, SimulationResult};
use crate::types::UserIdentity;

/// Name of the cookie carrying the client ID
pub const CLIENT_COOKIE: &str = "_ga";

/// Prefix stripped from a measurement ID to get the container ID
pub const MEASUREMENT_ID_PREFIX: &str = "G-";

/// Container ID of a measurement ID; a bare container ID is returned as is
pub fn container_id(container_hint: &str) -> &str {
    container_hint.strip_prefix(MEASUREMENT_ID_PREFIX).unwrap_or(container_hint)
}

/// Name of the session cookie for a measurement ID or bare container ID
pub fn session_cookie_name(container_hint: &str) -> String {
    format!("{}_{}", CLIENT_COOKIE, container_id(container_hint))
}

/// Resolves session descriptors into user identities
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    client_pattern: Regex,
    session_pattern: Regex,
    clock: SharedClock,
}

impl IdentityResolver {
    /// Create a resolver reading fallback time from `clock`
    pub fn new(clock: SharedClock) -> SimulationResult<Self> {
        let client_pattern = Regex::new(r"GA\d+\.\d+\.(\d+\.\d+)")
            .map_err(|e| SimulationError::configuration_error(e.to_string()))?;
        let session_pattern = Regex::new(r"GS\d+\.\d+\.(\d+)")
            .map_err(|e| SimulationError::configuration_error(e.to_string()))?;

        Ok(Self { client_pattern, session_pattern, clock })
    }

    /// Client ID embedded in a `_ga` cookie value
    pub fn client_id_from_cookie(&self, value: &str) -> Option<String> {
        self.client_pattern
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Session ID embedded in a `_ga_<container>` cookie value
    ///
    /// A zero or out-of-range session number counts as absent.
    pub fn session_id_from_cookie(&self, value: &str) -> Option<u64> {
        self.session_pattern
            .captures(value)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .filter(|id| *id != 0)
    }

    /// Synthetic client ID of the form `<unix_seconds>.<unix_millis mod 1e9>`
    pub fn fallback_client_id(&self) -> String {
        let millis = self.clock.unix_millis();
        format!("{}.{}", millis / 1000, millis % 1_000_000_000)
    }

    /// Synthetic session ID: the current unix second, never zero
    pub fn fallback_session_id(&self) -> u64 {
        self.clock.unix_seconds().max(1)
    }

    /// Resolve a descriptor into an identity
    ///
    /// `container_hint` is the measurement ID (`G-XXXX`) or the bare container ID.
    pub fn resolve(&self, descriptor: &SessionDescriptor, container_hint: &str) -> UserIdentity {
        let client_id = descriptor
            .cookie(CLIENT_COOKIE)
            .and_then(|value| self.client_id_from_cookie(value));
        let session_id = descriptor
            .cookie(&session_cookie_name(container_hint))
            .and_then(|value| self.session_id_from_cookie(value));

        if client_id.is_none() || session_id.is_none() {
            debug!(
                client_found = client_id.is_some(),
                session_found = session_id.is_some(),
                "Falling back to synthetic identity"
            );
        }

        UserIdentity::new(
            client_id.unwrap_or_else(|| self.fallback_client_id()),
            session_id.unwrap_or_else(|| self.fallback_session_id()),
        )
    }
}
