//! The correlation identifier and read-side helpers.
//!
//! Propagators store a [`CorrelationId`] in the request's [`Extensions`].
//! Handlers can take it directly:
//! ```rust,ignore
//! async fn handler(Extension(id): Extension<CorrelationId>) { ... }
//! ```
//! or go through [`extract_id`], which never fails and returns an empty
//! string when there is nothing to return.

use std::fmt;

use http::{Extensions, HeaderName, HeaderValue};

use crate::config::CorrelationConfig;

/// A resolved correlation identifier together with the key it was stored
/// under.
///
/// The value is opaque: it is neither parsed nor validated. When it came in
/// on a request header the original bytes are kept, so the header is echoed
/// exactly even if it is not visible ASCII.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId {
    key: HeaderName,
    value: String,
    raw: Option<HeaderValue>,
}

impl CorrelationId {
    pub fn new(key: HeaderName, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
            raw: None,
        }
    }

    /// Identifier taken from an inbound header. The string form is decoded
    /// lossily; the header form is the original value.
    pub fn from_header(key: HeaderName, raw: HeaderValue) -> Self {
        Self {
            key,
            value: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
            raw: Some(raw),
        }
    }

    pub fn key(&self) -> &HeaderName {
        &self.key
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }

    /// The identifier as a header value; `None` if it cannot be one.
    pub fn header_value(&self) -> Option<HeaderValue> {
        match &self.raw {
            Some(raw) => Some(raw.clone()),
            None => HeaderValue::from_str(&self.value).ok(),
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// The key currently configured.
pub fn current_key(config: &CorrelationConfig) -> &str {
    config.key()
}

/// Return the identifier stored in `extensions` under the configured key.
///
/// Empty when no propagator ran, or when the stored entry belongs to a
/// different key.
pub fn extract_id(config: &CorrelationConfig, extensions: &Extensions) -> String {
    extensions
        .get::<CorrelationId>()
        .filter(|id| id.key == *config.header_name())
        .map(|id| id.value.clone())
        .unwrap_or_default()
}
