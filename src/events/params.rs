//! Analytics events and their parameters
//!
//! Parameters are a fixed set of known keys plus an open `extra` map, so the
//! standard events stay statically checked while custom parameters still
//! reach the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of an analytics event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventName {
    /// `session_start`
    SessionStart,
    /// `first_visit`
    FirstVisit,
    /// `page_view`
    PageView,
    /// `user_engagement`
    UserEngagement,
    /// Any other event name
    Custom(String),
}

impl EventName {
    /// Wire name
    pub fn as_str(&self) -> &str {
        match self {
            EventName::SessionStart => "session_start",
            EventName::FirstVisit => "first_visit",
            EventName::PageView => "page_view",
            EventName::UserEngagement => "user_engagement",
            EventName::Custom(name) => name,
        }
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "session_start" => EventName::SessionStart,
            "first_visit" => EventName::FirstVisit,
            "page_view" => EventName::PageView,
            "user_engagement" => EventName::UserEngagement,
            _ => EventName::Custom(name),
        }
    }
}

impl From<EventName> for String {
    fn from(name: EventName) -> Self {
        match name {
            EventName::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventParams {
    /// Full URL of the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_location: Option<String>,
    /// Document title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    /// URL of the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_referrer: Option<String>,
    /// Engagement time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_time_msec: Option<u64>,
    /// Any further parameters
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EventParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page location
    pub fn with_page_location(mut self, location: impl Into<String>) -> Self {
        self.page_location = Some(location.into());
        self
    }

    /// Set the page title
    pub fn with_page_title(mut self, title: impl Into<String>) -> Self {
        self.page_title = Some(title.into());
        self
    }

    /// Set the referrer
    pub fn with_page_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.page_referrer = Some(referrer.into());
        self
    }

    /// Set the engagement time
    pub fn with_engagement_time(mut self, msec: u64) -> Self {
        self.engagement_time_msec = Some(msec);
        self
    }

    /// Add a custom parameter
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A named event with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Event name
    pub name: EventName,
    /// Event parameters
    pub params: EventParams,
}

impl AnalyticsEvent {
    /// Arbitrary event
    pub fn new(name: EventName, params: EventParams) -> Self {
        Self { name, params }
    }

    /// `session_start` with zero engagement
    pub fn session_start(page_location: impl Into<String>, page_title: impl Into<String>) -> Self {
        Self::new(
            EventName::SessionStart,
            EventParams::new()
                .with_page_location(page_location)
                .with_page_title(page_title)
                .with_engagement_time(0),
        )
    }

    /// `first_visit` with zero engagement
    pub fn first_visit() -> Self {
        Self::new(EventName::FirstVisit, EventParams::new().with_engagement_time(0))
    }

    /// `page_view`
    pub fn page_view(
        page_location: impl Into<String>,
        page_title: impl Into<String>,
        page_referrer: Option<String>,
        engagement_time_msec: u64,
    ) -> Self {
        let mut params = EventParams::new()
            .with_page_location(page_location)
            .with_page_title(page_title)
            .with_engagement_time(engagement_time_msec);
        params.page_referrer = page_referrer;
        Self::new(EventName::PageView, params)
    }

    /// `user_engagement`
    pub fn user_engagement(engagement_time_msec: u64, page_location: impl Into<String>) -> Self {
        Self::new(
            EventName::UserEngagement,
            EventParams::new()
                .with_engagement_time(engagement_time_msec)
                .with_page_location(page_location),
        )
    }
}

/// Title shown for a site path: `/about` gives `About`, `/` gives `Home`
pub fn page_title_for_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "Home".to_string();
    }

    let mut title = String::with_capacity(trimmed.len());
    let mut word_start = true;
    for c in trimmed.chars() {
        if c.is_alphabetic() {
            if word_start {
                title.extend(c.to_uppercase());
            } else {
                title.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            title.push(c);
            word_start = true;
        }
    }
    title
}
