//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error body and maps core
//! errors onto HTTP status codes.

use augur_chat::ChatError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 404 Not Found - unknown session or probe.
    NotFound(String),
    /// 409 Conflict - probe already committed.
    Conflict(String),
    /// 500 Internal Server Error.
    Internal(String),
    /// 503 Service Unavailable - turn processing disabled.
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.as_str()),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.as_str())
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg.as_str())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();
        let body = ErrorBody {
            error: error_code.to_string(),
            message: message.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let msg = err.to_string();
        match err {
            ChatError::SessionNotFound(_) | ChatError::ProbeNotFound(_) => ApiError::NotFound(msg),
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) | ChatError::ParseError(_) => {
                ApiError::BadRequest(msg)
            }
            ChatError::ProbeAlreadyCommitted(_) => ApiError::Conflict(msg),
            ChatError::Disabled => ApiError::ServiceUnavailable(msg),
            ChatError::NarratorError(_) | ChatError::StorageError(_) => ApiError::Internal(msg),
        }
    }
}

/// Malformed or non-JSON request bodies.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_mapping() {
        let cases = [
            (ChatError::SessionNotFound("s".into()), StatusCode::NOT_FOUND),
            (ChatError::ProbeNotFound("p".into()), StatusCode::NOT_FOUND),
            (ChatError::EmptyMessage, StatusCode::BAD_REQUEST),
            (ChatError::MessageTooLong(10), StatusCode::BAD_REQUEST),
            (ChatError::ParseError("bad".into()), StatusCode::BAD_REQUEST),
            (ChatError::ProbeAlreadyCommitted("p".into()), StatusCode::CONFLICT),
            (ChatError::Disabled, StatusCode::SERVICE_UNAVAILABLE),
            (ChatError::NarratorError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ChatError::StorageError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_into_response_status() {
        let resp = ApiError::Conflict("probe already committed: p1".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
