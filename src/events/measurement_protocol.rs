//! GA4 Measurement Protocol client
//!
//! Each emit posts one JSON payload:
//!
//! ```json
//! {"client_id": "...", "user_id": "...", "user_properties": {"k": {"value": "v"}},
//!  "events": [{"name": "page_view", "params": {"session_id": "42", "engagement_time_msec": 100}}]}
//! ```
//!
//! The collection endpoint answers 204 with no body. The validation endpoint
//! answers 200 with a `validationMessages` array that is empty for a good
//! payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::events::{AnalyticsEvent, EmitReceipt, EventParams, EventSink, EventSinkContext};
use crate::simulation::{SimulationError, SimulationResult};
use crate::types::{Ga4Config, UserIdentity};

/// Engagement time sent when an event does not set one
pub const DEFAULT_ENGAGEMENT_TIME_MSEC: u64 = 100;

/// Request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wrapped user property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPropertyValue {
    /// Property value
    pub value: serde_json::Value,
}

/// Parameters of one event on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadParams {
    /// Session the event belongs to, as a decimal string
    pub session_id: String,
    /// Event parameters with engagement time filled in
    #[serde(flatten)]
    pub params: EventParams,
}

/// One event on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEvent {
    /// Event name
    pub name: String,
    /// Event parameters
    pub params: PayloadParams,
}

/// Measurement Protocol request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPayload {
    /// Visitor identifier
    pub client_id: String,
    /// Signed-in user identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User-scoped properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_properties: Option<BTreeMap<String, UserPropertyValue>>,
    /// Events in this request
    pub events: Vec<PayloadEvent>,
}

/// Build the request body for `events` sent on behalf of `identity`
pub fn build_payload(identity: &UserIdentity, events: &[AnalyticsEvent]) -> MeasurementPayload {
    let user_properties = if identity.properties.is_empty() {
        None
    } else {
        Some(
            identity
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), UserPropertyValue { value: v.clone() }))
                .collect(),
        )
    };

    let events = events
        .iter()
        .map(|event| {
            let mut params = event.params.clone();
            params.extra.remove("session_id");
            params.extra.remove("engagement_time_msec");
            params.engagement_time_msec =
                Some(params.engagement_time_msec.unwrap_or(DEFAULT_ENGAGEMENT_TIME_MSEC));

            PayloadEvent {
                name: event.name.as_str().to_string(),
                params: PayloadParams { session_id: identity.session_id.to_string(), params },
            }
        })
        .collect();

    MeasurementPayload {
        client_id: identity.client_id.clone(),
        user_id: identity.user_id.clone(),
        user_properties,
        events,
    }
}

/// One finding reported by the validation endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationMessage {
    /// Offending field, when known
    #[serde(rename = "fieldPath", default)]
    pub field_path: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Machine-readable code
    #[serde(rename = "validationCode", default)]
    pub validation_code: Option<String>,
}

/// Body returned by the validation endpoint
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ValidationResponse {
    /// Findings; empty for a valid payload
    #[serde(rename = "validationMessages", default)]
    pub validation_messages: Vec<ValidationMessage>,
}

impl ValidationResponse {
    /// Findings formatted as `field: description (code)`
    pub fn describe(&self) -> Vec<String> {
        self.validation_messages
            .iter()
            .map(|m| {
                let mut line = match &m.field_path {
                    Some(path) => format!("{}: {}", path, m.description),
                    None => m.description.clone(),
                };
                if let Some(code) = &m.validation_code {
                    line.push_str(&format!(" ({})", code));
                }
                line
            })
            .collect()
    }
}

/// Event Sink posting to the Measurement Protocol
#[derive(Debug, Clone)]
pub struct MeasurementProtocolSink {
    ga4: Ga4Config,
    timeout: Duration,
}

impl MeasurementProtocolSink {
    /// Sink for the given property
    pub fn new(ga4: Ga4Config) -> Self {
        Self { ga4, timeout: DEFAULT_REQUEST_TIMEOUT }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EventSink for MeasurementProtocolSink {
    fn name(&self) -> &'static str {
        "measurement-protocol"
    }

    async fn open_context(&self, validate: bool) -> SimulationResult<Arc<dyn EventSinkContext>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SimulationError::event_sink_setup_error(e.to_string()))?;
        let endpoint = if validate { self.ga4.debug_endpoint() } else { self.ga4.endpoint() };

        Ok(Arc::new(MeasurementProtocolContext { client, endpoint, validate }))
    }
}

struct MeasurementProtocolContext {
    client: reqwest::Client,
    endpoint: String,
    validate: bool,
}

impl std::fmt::Debug for MeasurementProtocolContext {
    // The endpoint carries the API secret
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementProtocolContext")
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSinkContext for MeasurementProtocolContext {
    async fn emit(
        &self,
        identity: &UserIdentity,
        event: &AnalyticsEvent,
    ) -> SimulationResult<EmitReceipt> {
        let payload = build_payload(identity, slice::from_ref(event));
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(SimulationError::transport_error)?;

        let status = response.status().as_u16();
        let mut receipt = EmitReceipt {
            accepted: status == 200 || status == 204,
            status: Some(status),
            messages: Vec::new(),
        };

        if self.validate {
            let body = response.text().await.map_err(SimulationError::transport_error)?;
            if !body.trim().is_empty() {
                match serde_json::from_str::<ValidationResponse>(&body) {
                    Ok(validation) => receipt.messages = validation.describe(),
                    Err(e) => debug!(error = %e, "Unparseable validation response"),
                }
            }
            if !receipt.messages.is_empty() {
                warn!(
                    event = %event.name,
                    client_id = %identity.client_id,
                    messages = ?receipt.messages,
                    "Validation endpoint flagged event"
                );
                receipt.accepted = false;
            }
        }

        debug!(event = %event.name, status, accepted = receipt.accepted, "Event emitted");
        Ok(receipt)
    }

    async fn close(&self) -> SimulationResult<()> {
        Ok(())
    }
}
