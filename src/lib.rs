//! # Inference Gateway SDK
//!
//! A Rust SDK for interacting with the Inference Gateway, an HTTP service
//! that proxies requests to multiple LLM providers.
//!
//! ## Features
//!
//! - Async-first design with full `tokio` support
//! - Streaming responses delivered as typed Server-Sent Events
//! - Automatic retries with exponential backoff and `Retry-After` support
//! - Type-safe request and response handling
//! - Builder pattern for easy configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inference_gateway_sdk::{Client, Message, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), inference_gateway_sdk::Error> {
//!     let client = Client::builder()
//!         .base_url("http://localhost:8080")
//!         .api_key("your-api-key")
//!         .build()?;
//!
//!     let response = client
//!         .generate_content(
//!             Provider::OpenAI,
//!             "gpt-4o",
//!             vec![
//!                 Message::system("You are a helpful assistant."),
//!                 Message::user("Hello, world!"),
//!             ],
//!         )
//!         .await?;
//!
//!     println!("Response: {}", response.content());
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use inference_gateway_sdk::{Client, EventKind, Message, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), inference_gateway_sdk::Error> {
//!     let client = Client::builder()
//!         .base_url("http://localhost:8080")
//!         .build()?;
//!
//!     let mut events = client
//!         .generate_content_stream(
//!             Provider::Ollama,
//!             "llama2",
//!             vec![Message::user("Tell me a story")],
//!         )
//!         .await?;
//!
//!     while let Some(event) = events.next().await {
//!         match event.event {
//!             Some(EventKind::ContentDelta) => print!("{}", event.chunk()?.content()),
//!             Some(EventKind::Error) => eprintln!("{}", event.data_str().unwrap_or("")),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod config;
mod error;
mod request;
mod response;
mod retry;
mod streaming;

pub use client::{ChatBuilder, Client, ClientBuilder, MiddlewareOptions, RequestOptions};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use request::{
    ChatCompletionRequest, ChatCompletionRequestBuilder, ChatCompletionTool, Message, MessageRole,
    Provider, ToolFunction, ToolType,
};
pub use response::{
    ChatChoice, ChatCompletionResponse, FinishReason, FunctionCall, HealthResponse,
    ListModelsResponse, ListToolsResponse, McpTool, Model, ResponseMessage, ToolCall, Usage,
};
pub use retry::{RetryConfig, RetryObserver, RetryPolicy};
pub use streaming::{
    EventKind, EventStream, SseFraming, StreamChoice, StreamChunk, StreamDelta, StreamEvent,
    StreamFunctionCall, StreamToolCall,
};

// Re-export the cancellation token type used by `Client::with_cancellation`
// and `EventStream`.
pub use tokio_util::sync::CancellationToken;
