//! OpenAI-compatible API type definitions

use serde::{Deserialize, Serialize};

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Chat completion response (non-streaming)
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// Response choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

/// Response message
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One streamed completion chunk, parsed from a `data: ` line
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// Streaming choice
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
}

/// Streaming delta
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body returned by the upstream on non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorBody {
    pub error: UpstreamErrorDetail,
}

/// The upstream wraps errors either as `{"error":{"message":...}}` or as
/// a bare `{"error":"..."}` string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UpstreamErrorDetail {
    Detailed { message: String },
    Plain(String),
}

impl UpstreamErrorDetail {
    pub fn into_message(self) -> String {
        match self {
            UpstreamErrorDetail::Detailed { message } => message,
            UpstreamErrorDetail::Plain(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::system("a"), ChatMessage::user("b")],
            stream: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "b");
    }

    #[test]
    fn test_parse_completion_response() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "hello"}}]
        }))
        .unwrap();
        let content = response.choices[0].message.as_ref().unwrap().content.clone();
        assert_eq!(content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_parse_stream_chunk() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"foo"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("foo"));

        // Chunks without a delta content field still parse
        let chunk: StreamChunk = serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn test_upstream_error_shapes() {
        let detailed: UpstreamErrorBody =
            serde_json::from_str(r#"{"error":{"message":"bad key"}}"#).unwrap();
        assert_eq!(detailed.error.into_message(), "bad key");

        let plain: UpstreamErrorBody = serde_json::from_str(r#"{"error":"overloaded"}"#).unwrap();
        assert_eq!(plain.error.into_message(), "overloaded");
    }
}
