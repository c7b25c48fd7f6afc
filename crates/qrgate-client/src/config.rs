//! Connection settings shared by the validator and the subscription client.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Header carrying the service API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// How long a validation stream may stay silent before the session times out.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ClientConfig {
    base_url: Url,
    api_key: String,
    validation_timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("validation_timeout", &self.validation_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// `base_url` should be like `http://localhost:3000/api`; a trailing slash is ignored.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(base_url.scheme().to_string()));
        }
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn validation_timeout(&self) -> Duration {
        self.validation_timeout
    }

    /// `base_url` with `segments` appended as percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // http(s) URLs always have a path; the scheme is checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) fn auth_header(&self) -> (&'static str, &str) {
        (API_KEY_HEADER, &self.api_key)
    }
}
