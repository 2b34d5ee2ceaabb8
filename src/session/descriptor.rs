//! Raw session bootstrap output
//!
//! A [`SessionDescriptor`] is what a Session Provider hands back after a
//! visit: the cookie jar as it was left by the page's own instrumentation, the
//! page title and the final URL. Client and session identifiers live inside
//! the cookie values until the identity resolver extracts them.

use serde::{Deserialize, Serialize};

/// One cookie as observed after the visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Raw cookie value
    pub value: String,
}

impl SessionCookie {
    /// Create a cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Semi-structured result of one session bootstrap
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Cookies present once the page settled
    pub cookies: Vec<SessionCookie>,
    /// Document title, empty when the page had none
    pub page_title: String,
    /// Final URL after redirects
    pub page_location: String,
}

impl SessionDescriptor {
    /// Descriptor for a visit that ended on `page_location`
    pub fn new(page_location: impl Into<String>) -> Self {
        Self { page_location: page_location.into(), ..Default::default() }
    }

    /// Set the page title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.page_title = title.into();
        self
    }

    /// Add a cookie
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(SessionCookie::new(name, value));
        self
    }

    /// Value of the first cookie called `name`
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|cookie| cookie.name == name)
            .map(|cookie| cookie.value.as_str())
    }
}
