//! Client configuration for the Inference Gateway SDK.

use crate::retry::RetryConfig;
use crate::streaming::SseFraming;
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use url::Url;

/// Configuration for the Inference Gateway client.
///
/// Immutable after construction; shared by reference across all calls issued
/// by one client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the gateway.
    pub(crate) base_url: Url,
    /// API key for authentication.
    pub(crate) api_key: Option<Secret<String>>,
    /// Request timeout duration.
    pub(crate) timeout: Duration,
    /// Connection timeout duration.
    pub(crate) connect_timeout: Duration,
    /// Retry configuration.
    pub(crate) retry: RetryConfig,
    /// User agent string.
    pub(crate) user_agent: String,
    /// Default model to use.
    pub(crate) default_model: Option<String>,
    /// Custom headers to include in every request.
    pub(crate) custom_headers: Vec<(String, String)>,
    /// SSE framing variant spoken by the gateway.
    pub(crate) sse_framing: SseFraming,
}

impl ClientConfig {
    /// Default request timeout (30 seconds).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default connection timeout (10 seconds).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default user agent.
    pub const DEFAULT_USER_AGENT: &'static str =
        concat!("inference-gateway-sdk-rust/", env!("CARGO_PKG_VERSION"));

    /// Create a new configuration with default values.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            timeout: Self::DEFAULT_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            retry: RetryConfig::default(),
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
            default_model: None,
            custom_headers: Vec::new(),
            sse_framing: SseFraming::default(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Get the API key (exposed for use in requests).
    pub(crate) fn api_key_value(&self) -> Option<&str> {
        self.api_key.as_ref().map(|s| s.expose_secret().as_str())
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Get the retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Get the user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Get the default model.
    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    /// Get custom headers.
    pub fn custom_headers(&self) -> &[(String, String)] {
        &self.custom_headers
    }

    /// Get the SSE framing variant.
    pub fn sse_framing(&self) -> SseFraming {
        self.sse_framing
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Url::parse("http://localhost:8080").expect("valid default URL"))
    }
}
