//! Session bootstrap
//!
//! This module contains the Session Provider contract, the raw
//! [`SessionDescriptor`] a visit produces, and the [`IdentityResolver`] that
//! turns a descriptor into a [`UserIdentity`](crate::types::UserIdentity).
//!
//! # Backends
//!
//! - [`HttpSessionProvider`]: visits the target with `reqwest`
//! - [`MockSessionProvider`]: in-process fake with delay, failure injection
//!   and call recording
//!
//! # Usage Example
//!
//! ```rust
//! use ga4_user_simulator::session::*;
//! use ga4_user_simulator::simulation::SystemClock;
//! use std::sync::Arc;
//!
//! let descriptor = SessionDescriptor::new("https://example.com/")
//!     .with_cookie("_ga", "GA1.1.123456789.987654321")
//!     .with_cookie("_ga_ABC123", "GS1.1.42.1.1.0.0.0");
//!
//! let resolver = IdentityResolver::new(Arc::new(SystemClock)).unwrap();
//! let identity = resolver.resolve(&descriptor, "G-ABC123");
//! assert_eq!(identity.client_id, "123456789.987654321");
//! assert_eq!(identity.session_id, 42);
//! ```

pub mod descriptor;
pub mod http;
pub mod identity;
pub mod mock;
pub mod provider;

pub use descriptor::*;
pub use http::*;
pub use identity::*;
pub use mock::*;
pub use provider::*;
