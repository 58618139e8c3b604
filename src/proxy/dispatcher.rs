//! Upstream chat-completion dispatch

use axum::http::StatusCode;

use crate::api::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, UpstreamErrorBody};
use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Client for the upstream chat-completion service.
///
/// Holds the injected credential; nothing here reads the environment.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { http, config }
    }

    /// True when an API credential is configured.
    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Buffered completion: returns the generated answer text.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ProxyError> {
        let response = self.send(messages, false).await?;

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to decode upstream completion body");
            ProxyError::EmptyAnswer
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ProxyError::EmptyAnswer)
    }

    /// Streaming completion: returns the live upstream response body for
    /// the relay to consume. The status has already been vetted as success.
    pub async fn stream(&self, messages: Vec<ChatMessage>) -> Result<reqwest::Response, ProxyError> {
        self.send(messages, true).await
    }

    /// POST the message list upstream and map non-success statuses.
    async fn send(
        &self,
        messages: Vec<ChatMessage>,
        stream: bool,
    ) -> Result<reqwest::Response, ProxyError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProxyError::MissingCredential)?;

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            stream,
        };

        tracing::debug!(
            url = %self.config.url,
            model = %request.model,
            stream,
            "Dispatching upstream request"
        );

        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach upstream");
                ProxyError::UpstreamConnect(e)
            })?;

        let status =
            StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message_from_body(&response.text().await.unwrap_or_default())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("upstream error")
                    .to_string()
            });

        tracing::error!(status = %status, message = %message, "Upstream returned error status");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ProxyError::UnauthorizedCredential);
        }
        Err(ProxyError::Upstream { status, message })
    }
}

/// Extract a human-readable message from an upstream error body.
fn error_message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<UpstreamErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error.into_message())
        .filter(|message| !message.is_empty())
}
