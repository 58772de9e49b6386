//! Response types for the Inference Gateway SDK.

use crate::request::{MessageRole, Provider, ToolType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reason the model stopped generating tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model hit a natural stop point or a stop sequence.
    Stop,
    /// The maximum number of tokens was reached.
    Length,
    /// The model called one or more tools.
    ToolCalls,
    /// Content was omitted by a content filter.
    ContentFilter,
    /// The model called a function (deprecated form of `ToolCalls`).
    FunctionCall,
}

/// A function call made by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function.
    pub name: String,
    /// Arguments as a JSON string. The model does not always generate valid
    /// JSON; validate before calling the function.
    pub arguments: String,
}

/// A tool call made by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for the tool call.
    pub id: String,
    /// Type of the tool.
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    /// Function details.
    pub function: FunctionCall,
}

/// A message in a chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Role of the message sender.
    pub role: MessageRole,
    /// Content of the message.
    #[serde(default)]
    pub content: String,
    /// Reasoning produced alongside the content, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Tool calls made by the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// A single completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Index of this choice.
    pub index: u32,
    /// The generated message.
    pub message: ResponseMessage,
    /// Reason the model stopped generating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatChoice {
    /// Get the content of the message.
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Check if this choice completed normally.
    pub fn is_complete(&self) -> bool {
        self.finish_reason == Some(FinishReason::Stop)
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u64,
    /// Number of tokens in the generated completion.
    pub completion_tokens: u64,
    /// Total number of tokens used.
    pub total_tokens: u64,
}

impl Usage {
    /// Create new usage statistics.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from a content generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    pub id: String,
    /// Object type (always "chat.completion").
    pub object: String,
    /// Unix timestamp of when the completion was created.
    pub created: i64,
    /// Model used for the completion.
    pub model: String,
    /// List of completion choices.
    pub choices: Vec<ChatChoice>,
    /// Token usage statistics.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Get the content of the first choice.
    ///
    /// Convenience for the common single-choice case.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("")
    }

    /// Get the reasoning of the first choice, if present.
    pub fn reasoning(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.reasoning.as_deref())
    }

    /// Get the finish reason of the first choice.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason)
    }

    /// Get the tool calls of the first choice, if any.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        self.choices
            .first()
            .and_then(|c| c.message.tool_calls.as_deref())
    }

    /// Get the total number of tokens used.
    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().map(|u| u.total_tokens)
    }
}

/// Information about a model served through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier, prefixed with its provider (e.g. "openai/gpt-4o").
    pub id: String,
    /// Object type (always "model").
    pub object: String,
    /// Unix timestamp of when the model was created.
    pub created: i64,
    /// Organization that owns the model.
    pub owned_by: String,
    /// Provider the gateway routes this model through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_by: Option<Provider>,
}

/// Response containing a list of models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListModelsResponse {
    /// Provider the listing was filtered to, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    /// Object type (always "list").
    pub object: String,
    /// List of available models.
    pub data: Vec<Model>,
}

/// A tool exposed by an MCP server behind the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MCP server the tool lives on.
    pub server: String,
    /// JSON-schema input description, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

/// Response containing the list of MCP tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    /// Object type (always "list").
    pub object: String,
    /// List of available tools.
    pub data: Vec<McpTool>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Additional details reported by the gateway.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl HealthResponse {
    /// Check if the status is healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_lowercase().as_str(), "healthy" | "ok" | "up")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_content() {
        let response = ChatCompletionResponse {
            id: "chat-12345".to_string(),
            object: "chat.completion".to_string(),
            created: 1693672537,
            model: "gpt-4o".to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: "Hello, world!".to_string(),
                    reasoning: None,
                    tool_calls: None,
                },
                finish_reason: Some(FinishReason::Stop),
            }],
            usage: Some(Usage::new(10, 5)),
        };

        assert_eq!(response.content(), "Hello, world!");
        assert_eq!(response.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(response.total_tokens(), Some(15));
        assert!(response.choices[0].is_complete());
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "id": "chat-12345",
            "object": "chat.completion",
            "created": 1693672537,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Go is a programming language."
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 42,
                "completion_tokens": 25,
                "total_tokens": 67
            }
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, "chat-12345");
        assert!(response.content().contains("programming language"));
        assert_eq!(response.total_tokens(), Some(67));
    }

    #[test]
    fn test_tool_call_deserialization() {
        let json = r#"{
            "role": "assistant",
            "content": "",
            "tool_calls": [{
                "id": "call-1",
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "arguments": "{\"location\": \"Berlin\"}"
                }
            }]
        }"#;

        let message: ResponseMessage = serde_json::from_str(json).unwrap();
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
    }

    #[test]
    fn test_models_list_deserialization() {
        let json = r#"{
            "provider": "openai",
            "object": "list",
            "data": [{
                "id": "openai/gpt-4o",
                "object": "model",
                "created": 1686935002,
                "owned_by": "openai",
                "served_by": "openai"
            }]
        }"#;

        let models: ListModelsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(models.provider, Some(Provider::OpenAI));
        assert_eq!(models.data.len(), 1);
        assert_eq!(models.data[0].id, "openai/gpt-4o");
        assert_eq!(models.data[0].served_by, Some(Provider::OpenAI));
    }

    #[test]
    fn test_tools_list_deserialization() {
        let json = r#"{
            "object": "list",
            "data": [{
                "name": "read_file",
                "description": "Read content from a file",
                "server": "http://mcp-filesystem-server:8083/mcp",
                "input_schema": {"type": "object"}
            }]
        }"#;

        let tools: ListToolsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tools.data.len(), 1);
        assert_eq!(tools.data[0].name, "read_file");
        assert!(tools.data[0].input_schema.is_some());
    }

    #[test]
    fn test_health_response() {
        let health: HealthResponse = serde_json::from_str(r#"{"status": "healthy"}"#).unwrap();
        assert!(health.is_healthy());

        let down: HealthResponse = serde_json::from_str(r#"{"status": "degraded"}"#).unwrap();
        assert!(!down.is_healthy());
    }
}
