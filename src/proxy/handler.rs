//! Request handling for the assistant endpoint

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::dispatcher::UpstreamClient;
use super::server::ProxyState;
use super::streaming;
use crate::error::ProxyError;
use crate::prompts::{build_messages, RequestKind};

/// Largest accepted request body (1 MiB)
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Handler for the single assistant endpoint
pub struct AssistantHandler {
    upstream: UpstreamClient,
}

impl AssistantHandler {
    pub fn new(state: ProxyState) -> Self {
        Self {
            upstream: state.upstream,
        }
    }

    /// Handle an incoming request to the assistant endpoint.
    ///
    /// Errors are converted to a JSON `{error}` body here, at the top
    /// level. A streaming response that has already begun cannot be
    /// retrofitted with an error status; those failures are only logged.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        if req.method() != Method::POST {
            tracing::debug!(method = %req.method(), "Rejecting non-POST request");
            let mut response = (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "method not allowed, use POST" })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
            return response;
        }

        match self.dispatch(req).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn dispatch(&self, req: Request<Body>) -> Result<Response, ProxyError> {
        if !self.upstream.has_credential() {
            return Err(ProxyError::MissingCredential);
        }

        let body_bytes = to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| ProxyError::InvalidRequest(format!("failed to read request body: {e}")))?;

        let body: serde_json::Value = serde_json::from_slice(&body_bytes)
            .map_err(|e| ProxyError::InvalidRequest(format!("invalid JSON body: {e}")))?;

        let tag = body
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ProxyError::InvalidRequest("missing `type` field".to_string()))?;
        let payload = body
            .get("payload")
            .cloned()
            .ok_or_else(|| ProxyError::InvalidRequest("missing `payload` field".to_string()))?;
        let stream = body
            .get("stream")
            .and_then(|s| s.as_bool())
            .unwrap_or(false);

        let kind = RequestKind::parse(tag, payload)?;
        let messages = build_messages(&kind);

        tracing::info!(kind = kind.name(), stream, "Handling assistant request");

        if stream {
            let upstream_response = self.upstream.stream(Vec::from(messages)).await?;
            let mut response = Response::new(Body::from_stream(streaming::relay(upstream_response)));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            Ok(response)
        } else {
            let answer = self.upstream.complete(Vec::from(messages)).await?;
            Ok((StatusCode::OK, Json(json!({ "answer": answer }))).into_response())
        }
    }
}
