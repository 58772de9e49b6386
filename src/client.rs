//! HTTP client for the Inference Gateway SDK.

use crate::config::ClientConfig;
use crate::error::{ApiErrorResponse, Error, Result};
use crate::request::{
    ChatCompletionRequest, ChatCompletionRequestBuilder, ChatCompletionTool, Message, Provider,
};
use crate::response::{
    ChatCompletionResponse, HealthResponse, ListModelsResponse, ListToolsResponse,
};
use crate::retry::{parse_retry_after, RetryConfig, RetryPolicy};
use crate::streaming::{self, EventStream, SseFraming};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT,
};
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

/// Client for interacting with the Inference Gateway.
///
/// # Example
///
/// ```rust,no_run
/// use inference_gateway_sdk::{Client, Message, Provider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), inference_gateway_sdk::Error> {
///     let client = Client::builder()
///         .base_url("http://localhost:8080")
///         .api_key("your-api-key")
///         .build()?;
///
///     let response = client
///         .generate_content(
///             Provider::OpenAI,
///             "gpt-4o",
///             vec![Message::user("Hello!")],
///         )
///         .await?;
///
///     println!("{}", response.content());
///     Ok(())
/// }
/// ```
///
/// # Concurrency
///
/// A `Client` is immutable after construction. The `with_*` methods are
/// copy-on-write: each returns a new client value sharing the underlying
/// connection pool, so per-call configuration on one clone can never race a
/// call in flight on another.
#[derive(Clone)]
pub struct Client {
    /// HTTP client.
    http: reqwest::Client,
    /// Client configuration.
    config: Arc<ClientConfig>,
    /// Retry policy shared by all operations.
    retry: RetryPolicy,
    /// Per-call configuration.
    call: CallOptions,
}

/// Per-call configuration attached to a client value.
#[derive(Debug, Clone, Default)]
struct CallOptions {
    request: RequestOptions,
    headers: Vec<(String, String)>,
    middleware: MiddlewareOptions,
    cancellation: Option<CancellationToken>,
    framing: Option<SseFraming>,
}

/// One-shot request defaults applied to generated requests where the request
/// itself leaves the field unset.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Reasoning delivery format ("parsed" or "raw").
    pub reasoning_format: Option<String>,
    /// Tools the model may call.
    pub tools: Option<Vec<ChatCompletionTool>>,
}

/// Flags that bypass gateway middleware for the calls issued by this client
/// value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiddlewareOptions {
    /// Skip MCP middleware (`X-MCP-Bypass: true`).
    pub skip_mcp: bool,
    /// Skip A2A middleware (`X-A2A-Bypass: true`).
    pub skip_a2a: bool,
    /// Route directly to the provider (`X-Direct-Provider: true`).
    pub direct_provider: bool,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| Error::configuration(format!("Invalid user agent: {}", e)))?,
        );

        // Add API key header if present
        if let Some(api_key) = config.api_key_value() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .map_err(|e| Error::configuration(format!("Invalid API key: {}", e)))?,
            );
        }

        // Add custom headers
        for (name, value) in &config.custom_headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                Error::configuration(format!("Invalid header name '{}': {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                Error::configuration(format!("Invalid header value for '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;

        let retry = RetryPolicy::new(config.retry.clone());

        Ok(Self {
            http,
            config: Arc::new(config),
            retry,
            call: CallOptions::default(),
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Return a client with one-shot request defaults applied to every
    /// generated request (copy-on-write; `self` is unchanged).
    pub fn with_options(&self, options: RequestOptions) -> Self {
        let mut client = self.clone();
        client.call.request = options;
        client
    }

    /// Return a client that sends an additional header on every request
    /// (copy-on-write; `self` is unchanged).
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut client = self.clone();
        client.call.headers.push((name.into(), value.into()));
        client
    }

    /// Return a client that sends the given headers on every request
    /// (copy-on-write; `self` is unchanged).
    pub fn with_headers(&self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut client = self.clone();
        client.call.headers.extend(headers);
        client
    }

    /// Return a client with the given middleware bypass flags
    /// (copy-on-write; `self` is unchanged).
    pub fn with_middleware_options(&self, options: MiddlewareOptions) -> Self {
        let mut client = self.clone();
        client.call.middleware = options;
        client
    }

    /// Return a client whose operations abort when the given token fires
    /// (copy-on-write; `self` is unchanged).
    ///
    /// The token governs retry waits, in-flight attempts, and streaming
    /// reads.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut client = self.clone();
        client.call.cancellation = Some(token);
        client
    }

    /// Return a client decoding streams with the given framing variant
    /// (copy-on-write; `self` is unchanged).
    pub fn with_framing(&self, framing: SseFraming) -> Self {
        let mut client = self.clone();
        client.call.framing = Some(framing);
        client
    }

    /// Create a fluent content generation builder.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use inference_gateway_sdk::{Client, Provider};
    /// # async fn example(client: &Client) -> Result<(), inference_gateway_sdk::Error> {
    /// let response = client
    ///     .chat()
    ///     .provider(Provider::Groq)
    ///     .model("llama-3.3-70b-versatile")
    ///     .system_message("You are helpful")
    ///     .user_message("Hello!")
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn chat(&self) -> ChatBuilder {
        ChatBuilder::new(self.clone())
    }

    /// List all models available through the gateway.
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<ListModelsResponse> {
        let url = self.url("/v1/models")?;
        let extra = self.extra_headers()?;
        let cancel = self.cancel_token();

        debug!("Listing models from {}", url);

        let response = self
            .retry
            .execute(&cancel, || async {
                self.http
                    .get(url.clone())
                    .headers(extra.clone())
                    .send()
                    .await
                    .map_err(|e| self.map_reqwest_error(e))
            })
            .await?;

        self.handle_response(response).await
    }

    /// List the models served by a specific provider.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn list_provider_models(&self, provider: Provider) -> Result<ListModelsResponse> {
        let url = self.url("/v1/models")?;
        let extra = self.extra_headers()?;
        let cancel = self.cancel_token();

        debug!("Listing {} models from {}", provider, url);

        let response = self
            .retry
            .execute(&cancel, || async {
                self.http
                    .get(url.clone())
                    .query(&[("provider", provider.as_str())])
                    .headers(extra.clone())
                    .send()
                    .await
                    .map_err(|e| self.map_reqwest_error(e))
            })
            .await?;

        self.handle_response(response).await
    }

    /// List the MCP tools exposed by the gateway.
    ///
    /// The gateway returns 403 unless it is started with `EXPOSE_MCP=true`.
    #[instrument(skip(self))]
    pub async fn list_tools(&self) -> Result<ListToolsResponse> {
        let url = self.url("/v1/mcp/tools")?;
        let extra = self.extra_headers()?;
        let cancel = self.cancel_token();

        debug!("Listing MCP tools from {}", url);

        let response = self
            .retry
            .execute(&cancel, || async {
                self.http
                    .get(url.clone())
                    .headers(extra.clone())
                    .send()
                    .await
                    .map_err(|e| self.map_reqwest_error(e))
            })
            .await?;

        self.handle_response(response).await
    }

    /// Generate content with the given provider and model.
    pub async fn generate_content(
        &self,
        provider: Provider,
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<ChatCompletionResponse> {
        if messages.is_empty() {
            return Err(Error::invalid_request("at least one message is required"));
        }
        let request = ChatCompletionRequest::new(model, messages);
        self.chat_completion(provider, &request).await
    }

    /// Generate content as a live event stream.
    ///
    /// Events arrive in decoding order on a bounded queue; the stream ends
    /// after a `stream-end` event, an `error` event, or clean EOF.
    pub async fn generate_content_stream(
        &self,
        provider: Provider,
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<EventStream> {
        if messages.is_empty() {
            return Err(Error::invalid_request("at least one message is required"));
        }
        let request = ChatCompletionRequest::new(model, messages);
        self.chat_completion_stream(provider, &request).await
    }

    /// Send a chat completion request.
    #[instrument(skip(self, request), fields(provider = %provider, model = %request.model))]
    pub async fn chat_completion(
        &self,
        provider: Provider,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let url = self.url("/v1/chat/completions")?;

        let mut request = request.clone();
        self.apply_options(&mut request);
        request.stream = Some(false);

        let extra = self.extra_headers()?;
        let cancel = self.cancel_token();

        debug!("Sending chat completion request to {}", url);

        let response = self
            .retry
            .execute(&cancel, || async {
                self.http
                    .post(url.clone())
                    .query(&[("provider", provider.as_str())])
                    .headers(extra.clone())
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| self.map_reqwest_error(e))
            })
            .await?;

        self.handle_response(response).await
    }

    /// Send a streaming chat completion request.
    #[instrument(skip(self, request), fields(provider = %provider, model = %request.model))]
    pub async fn chat_completion_stream(
        &self,
        provider: Provider,
        request: &ChatCompletionRequest,
    ) -> Result<EventStream> {
        let url = self.url("/v1/chat/completions")?;

        let mut request = request.clone();
        self.apply_options(&mut request);
        request.stream = Some(true);

        let extra = self.extra_headers()?;
        let cancel = self.cancel_token();

        debug!("Sending streaming chat completion request to {}", url);

        let response = self
            .retry
            .execute(&cancel, || async {
                self.http
                    .post(url.clone())
                    .query(&[("provider", provider.as_str())])
                    .headers(extra.clone())
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| self.map_reqwest_error(e))
            })
            .await?;

        if !response.status().is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let framing = self.call.framing.unwrap_or(self.config.sse_framing);
        let stream_cancel = cancel.child_token();
        let rx = streaming::spawn_decoder(
            response.bytes_stream(),
            framing,
            stream_cancel.clone(),
        );

        Ok(EventStream::new(rx, stream_cancel))
    }

    /// Check the health of the gateway.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/health")?;
        let extra = self.extra_headers()?;
        let cancel = self.cancel_token();

        debug!("Checking health at {}", url);

        let response = self
            .retry
            .execute(&cancel, || async {
                self.http
                    .get(url.clone())
                    .headers(extra.clone())
                    .send()
                    .await
                    .map_err(|e| self.map_reqwest_error(e))
            })
            .await?;

        if !response.status().is_success() {
            return Err(self.handle_error_response(response).await);
        }

        // The health endpoint may answer 200 with an empty body.
        let body = response
            .text()
            .await
            .map_err(|e| Error::parse(format!("Failed to read health response: {}", e)))?;

        if body.trim().is_empty() {
            return Ok(HealthResponse {
                status: "ok".to_string(),
                extra: Default::default(),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::parse(format!("Failed to parse health response: {}", e)))
    }

    /// Check if the gateway is healthy.
    pub async fn is_healthy(&self) -> bool {
        self.health().await.map(|h| h.is_healthy()).unwrap_or(false)
    }

    /// Build a URL for the given path.
    fn url(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| Error::configuration(format!("Invalid URL path '{}': {}", path, e)))
    }

    /// The cancellation token governing this call.
    fn cancel_token(&self) -> CancellationToken {
        self.call.cancellation.clone().unwrap_or_default()
    }

    /// Fill unset request fields from the client's one-shot defaults.
    fn apply_options(&self, request: &mut ChatCompletionRequest) {
        let options = &self.call.request;
        if request.max_tokens.is_none() {
            request.max_tokens = options.max_tokens;
        }
        if request.temperature.is_none() {
            request.temperature = options.temperature;
        }
        if request.reasoning_format.is_none() {
            request.reasoning_format = options.reasoning_format.clone();
        }
        if request.tools.is_none() {
            request.tools = options.tools.clone();
        }
    }

    /// Headers attached per-request: custom per-call headers plus middleware
    /// bypass flags.
    fn extra_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.call.headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                Error::configuration(format!("Invalid header name '{}': {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                Error::configuration(format!("Invalid header value for '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        if self.call.middleware.skip_mcp {
            headers.insert(
                HeaderName::from_static("x-mcp-bypass"),
                HeaderValue::from_static("true"),
            );
        }
        if self.call.middleware.skip_a2a {
            headers.insert(
                HeaderName::from_static("x-a2a-bypass"),
                HeaderValue::from_static("true"),
            );
        }
        if self.call.middleware.direct_provider {
            headers.insert(
                HeaderName::from_static("x-direct-provider"),
                HeaderValue::from_static("true"),
            );
        }

        Ok(headers)
    }

    /// Handle a response expected to carry a JSON body on success.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::parse(format!("Failed to parse response: {}", e)))
        } else {
            Err(self.handle_error_response(response).await)
        }
    }

    /// Turn a non-success response into a typed error.
    async fn handle_error_response(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error);

        match status {
            401 => Error::Authentication {
                message: message.unwrap_or(body),
            },
            429 => Error::RateLimited {
                retry_after: retry_after.map(|d| d.as_secs()),
                request_id,
            },
            503 => Error::Unavailable {
                message: message.unwrap_or(body),
            },
            _ => Error::Api {
                status,
                message: message.unwrap_or_else(|| {
                    if body.is_empty() {
                        format!("HTTP {}", status)
                    } else {
                        body
                    }
                }),
                request_id,
            },
        }
    }

    /// Map a reqwest error to an SDK error.
    fn map_reqwest_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                duration_ms: self.config.timeout.as_millis() as u64,
            }
        } else if error.is_connect() {
            Error::Connection {
                message: error.to_string(),
            }
        } else {
            Error::Http(error)
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.config.has_api_key())
            .finish()
    }
}

/// Builder for creating a [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    base_url: Option<Url>,
    api_key: Option<Secret<String>>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    retry: Option<RetryConfig>,
    user_agent: Option<String>,
    default_model: Option<String>,
    custom_headers: Vec<(String, String)>,
    sse_framing: Option<SseFraming>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = Url::parse(url.as_ref()).ok();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(key.into()));
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the default model applied by [`Client::chat`].
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Add a custom header sent on every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Set the SSE framing variant spoken by the gateway.
    pub fn sse_framing(mut self, framing: SseFraming) -> Self {
        self.sse_framing = Some(framing);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| Url::parse("http://localhost:8080").expect("valid default URL"));

        let config = ClientConfig {
            base_url,
            api_key: self.api_key,
            timeout: self.timeout.unwrap_or(ClientConfig::DEFAULT_TIMEOUT),
            connect_timeout: self
                .connect_timeout
                .unwrap_or(ClientConfig::DEFAULT_CONNECT_TIMEOUT),
            retry: self.retry.unwrap_or_default(),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| ClientConfig::DEFAULT_USER_AGENT.to_string()),
            default_model: self.default_model,
            custom_headers: self.custom_headers,
            sse_framing: self.sse_framing.unwrap_or_default(),
        };

        Client::new(config)
    }
}

/// Builder for content generation requests.
pub struct ChatBuilder {
    client: Client,
    provider: Option<Provider>,
    builder: ChatCompletionRequestBuilder,
}

impl ChatBuilder {
    fn new(client: Client) -> Self {
        let mut builder = ChatCompletionRequestBuilder::new();

        // Apply default model if set
        if let Some(model) = client.config.default_model() {
            builder = builder.model(model);
        }

        Self {
            client,
            provider: None,
            builder,
        }
    }

    /// Set the provider to route through.
    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the model to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.builder = self.builder.model(model);
        self
    }

    /// Add a message.
    pub fn message(mut self, message: Message) -> Self {
        self.builder = self.builder.message(message);
        self
    }

    /// Set the system message.
    pub fn system_message(mut self, content: impl Into<String>) -> Self {
        self.builder = self.builder.system_message(content);
        self
    }

    /// Add a user message.
    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.builder = self.builder.user_message(content);
        self
    }

    /// Add an assistant message.
    pub fn assistant_message(mut self, content: impl Into<String>) -> Self {
        self.builder = self.builder.assistant_message(content);
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.builder = self.builder.temperature(temperature);
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.builder = self.builder.max_tokens(max_tokens);
        self
    }

    /// Set the reasoning delivery format.
    pub fn reasoning_format(mut self, format: impl Into<String>) -> Self {
        self.builder = self.builder.reasoning_format(format);
        self
    }

    /// Set the tools the model may call.
    pub fn tools(mut self, tools: Vec<ChatCompletionTool>) -> Self {
        self.builder = self.builder.tools(tools);
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<ChatCompletionResponse> {
        let provider = self
            .provider
            .ok_or_else(|| Error::invalid_request("provider is required"))?;
        let request = self.builder.build()?;
        self.client.chat_completion(provider, &request).await
    }

    /// Send as a streaming request.
    pub async fn stream(self) -> Result<EventStream> {
        let provider = self
            .provider
            .ok_or_else(|| Error::invalid_request("provider is required"))?;
        let request = self.builder.streaming(true).build()?;
        self.client.chat_completion_stream(provider, &request).await
    }
}
