//! Proxy error taxonomy and HTTP status mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors produced while handling an assistant request.
///
/// Every variant maps to one HTTP status; upstream failures other than 401
/// are relayed with the upstream's own status and message.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown request type: {0}")]
    UnknownRequestKind(String),

    #[error("server is missing the upstream API credential")]
    MissingCredential,

    #[error("upstream rejected the API credential")]
    UnauthorizedCredential,

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned an empty answer")]
    EmptyAnswer,

    #[error("failed to reach upstream: {0}")]
    UpstreamConnect(#[source] reqwest::Error),
}

impl ProxyError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::UnknownRequestKind(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::MissingCredential | ProxyError::EmptyAnswer => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::UnauthorizedCredential => StatusCode::UNAUTHORIZED,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::UpstreamConnect(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::UnknownRequestKind("bogus".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::MissingCredential.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::UnauthorizedCredential.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::EmptyAnswer.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = ProxyError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "rate limited".into(),
        };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_unknown_kind_carries_tag() {
        let err = ProxyError::UnknownRequestKind("bogus".into());
        assert!(err.to_string().contains("bogus"));
    }
}
