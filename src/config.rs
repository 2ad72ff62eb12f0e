//! Correlation ID configuration.
//!
//! [`CorrelationConfig`] holds the header/context key and the function that
//! mints new identifiers. It is built once at startup, adjusted through the
//! setters, then wrapped in an `Arc` and handed to every propagator. Once
//! shared it is read-only, so there is nothing to coordinate at request time.
//!
//! The setters never fail. Invalid input (an empty key, a missing generator)
//! is ignored and the previous value stays in effect.
//!
//! [`Settings`] is the optional TOML file read by the `correlation-echo`
//! binary. Unlike the setters it is strict: a bad header name is rejected at
//! load time so the server never starts with a config it would silently
//! ignore.
//!
//! # Example
//! ```toml
//! [server]
//! port = 8080
//!
//! [correlation]
//! header = "X-Correlation-ID"
//! casing = "upper"
//! ```

use std::{fmt, path::Path, sync::Arc};

use http::HeaderName;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::ConfigError;

/// Header and context key used when nothing else is configured.
pub const DEFAULT_KEY: &str = "X-Correlation-ID";

/// Produces a fresh correlation identifier.
pub type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Letter case used when rendering generated UUIDs.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    /// `3F2504E0-4F89-41D3-9A0C-0305E82C3301`
    #[default]
    Upper,
    /// `3f2504e0-4f89-41d3-9a0c-0305e82c3301`
    Lower,
}

/// Random (v4) UUID generator rendered hyphenated in the given case.
pub fn uuid_generator(casing: Casing) -> Generator {
    match casing {
        Casing::Upper => Arc::new(|| {
            let mut buf = Uuid::encode_buffer();
            Uuid::new_v4().hyphenated().encode_upper(&mut buf).to_owned()
        }),
        Casing::Lower => Arc::new(|| Uuid::new_v4().hyphenated().to_string()),
    }
}

/// Active key name and identifier generator.
#[derive(Clone)]
pub struct CorrelationConfig {
    /// The key exactly as configured; used for string-keyed stores.
    key: String,
    /// The same key parsed as a header name.
    header: HeaderName,
    generator: Generator,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_owned(),
            header: HeaderName::from_static("x-correlation-id"),
            generator: uuid_generator(Casing::default()),
        }
    }
}

impl fmt::Debug for CorrelationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationConfig")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl CorrelationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configured key, as it was set.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The configured key as an HTTP header name (lowercased).
    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Mint a new identifier with the configured generator.
    pub fn generate(&self) -> String {
        (self.generator)()
    }

    /// Replace the key. Empty input is ignored; so is anything that is not a
    /// valid header name, since the key is also written as a header.
    pub fn set_key(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        match HeaderName::from_bytes(value.as_bytes()) {
            Ok(header) => {
                self.key = value.to_owned();
                self.header = header;
            }
            Err(_) => warn!(key = value, "ignoring invalid correlation header name"),
        }
    }

    /// Replace the generator. `None` leaves the current one in place.
    pub fn set_generator<F>(&mut self, generator: Option<F>)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        if let Some(generator) = generator {
            self.generator = Arc::new(generator);
        }
    }

    /// Restore the default key and generator.
    pub fn reset_to_default(&mut self) {
        *self = Self::default();
    }

    /// Builder form of [`set_key`](Self::set_key).
    pub fn with_key(mut self, value: &str) -> Self {
        self.set_key(value);
        self
    }

    /// Builder form of [`set_generator`](Self::set_generator).
    pub fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.set_generator(Some(generator));
        self
    }
}

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

/// Top-level settings for the `correlation-echo` server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub correlation: CorrelationSettings,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Listen address (default: `127.0.0.1`).
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Listen port (default: 8080).
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            log_level: None,
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// The `[correlation]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationSettings {
    /// Header and context key (default: `X-Correlation-ID`).
    #[serde(default = "defaults::header")]
    pub header: String,

    /// Case used for generated UUIDs (default: upper).
    #[serde(default)]
    pub casing: Casing,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            header: defaults::header(),
            casing: Casing::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let header = &self.correlation.header;
        if header.is_empty() || HeaderName::from_bytes(header.as_bytes()).is_err() {
            return Err(ConfigError::InvalidHeader(header.clone()));
        }
        Ok(())
    }

    /// Build the runtime configuration described by these settings.
    pub fn correlation_config(&self) -> CorrelationConfig {
        let mut config = CorrelationConfig::default().with_key(&self.correlation.header);
        config.generator = uuid_generator(self.correlation.casing);
        config
    }
}

mod defaults {
    pub fn host() -> String { "127.0.0.1".to_owned() }
    pub fn port() -> u16 { 8080 }
    pub fn header() -> String { super::DEFAULT_KEY.to_owned() }
}
