//! Identifier types for the GA4 user simulator
//!
//! This module contains the run identifier that tags every simulation run and
//! the [`UserIdentity`] that one simulated visitor carries through its events.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RUN_{}", self.0.simple())
    }
}

impl Serialize for RunId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("RUN_{}", self.0.simple()))
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let raw = s.strip_prefix("RUN_").unwrap_or(&s);
        let uuid = Uuid::parse_str(raw).map_err(serde::de::Error::custom)?;
        Ok(RunId(uuid))
    }
}

/// Identity of one simulated visitor for the duration of a run
///
/// `client_id` and `session_id` together identify the visitor towards the
/// analytics backend. An identity is built once per unit and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Per-browser visitor identifier (`seconds.subseconds` shape)
    pub client_id: String,
    /// Identifier of the current visit window
    pub session_id: u64,
    /// Optional signed-in user identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User-scoped properties forwarded with every event
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl UserIdentity {
    /// Create an anonymous identity
    pub fn new(client_id: impl Into<String>, session_id: u64) -> Self {
        Self {
            client_id: client_id.into(),
            session_id,
            user_id: None,
            properties: BTreeMap::new(),
        }
    }

    /// Attach a signed-in user identifier
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a user property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Both halves of the identity are populated
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && self.session_id != 0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.session_id)
    }
}
