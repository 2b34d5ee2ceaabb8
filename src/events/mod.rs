//! Analytics events and the Event Sink
//!
//! This module contains the tagged event model, the Event Sink contract and
//! its backends.
//!
//! # Overview
//!
//! - **Events**: [`AnalyticsEvent`], [`EventName`] and [`EventParams`], with
//!   constructors for the standard GA4 events
//! - **Sink contract**: [`EventSink`] opens one [`EventSinkContext`] per run
//! - **Backends**: [`MeasurementProtocolSink`] for GA4, [`MockEventSink`] for
//!   offline runs and tests
//!
//! # Usage Example
//!
//! ```rust
//! use ga4_user_simulator::events::*;
//! use ga4_user_simulator::types::UserIdentity;
//!
//! let identity = UserIdentity::new("123.456", 42);
//! let event = AnalyticsEvent::page_view("https://example.com/about", "About", None, 1200);
//!
//! let payload = build_payload(&identity, &[event]);
//! assert_eq!(payload.events[0].name, "page_view");
//! assert_eq!(payload.events[0].params.session_id, "42");
//! ```

pub mod measurement_protocol;
pub mod params;
pub mod sink;

pub use measurement_protocol::*;
pub use params::*;
pub use sink::*;
