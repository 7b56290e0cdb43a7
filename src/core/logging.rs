//! Redaction helpers for credentials that end up in log fields
//!
//! ```rust,ignore
//! use alpha_sync::core::logging::SanitizedValue;
//!
//! let token = "eyJhbGciOiJIUzI1NiJ9";
//! tracing::debug!(token = %SanitizedValue::new(token), "Subscribing");
//! // Output: token = "eyJh...REDACTED"
//! ```

use std::fmt;

/// Wrapper for sensitive data that should be redacted in logs.
///
/// `Display` shows the first 4 characters followed by "...REDACTED" for
/// values longer than 8 characters, and just "REDACTED" otherwise.
#[derive(Clone)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }
}

impl<'a> fmt::Display for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.chars().count() > 8 {
            let prefix: String = self.0.chars().take(4).collect();
            write!(f, "{}...REDACTED", prefix)
        } else {
            write!(f, "REDACTED")
        }
    }
}

impl<'a> fmt::Debug for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SanitizedValue({})", self)
    }
}
