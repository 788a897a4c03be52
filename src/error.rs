//! Caller-facing failure type for the chat function.
//!
//! Every failure the function surfaces is a [`FunctionError`]: a short
//! [`ErrorKind`] tag plus a human-readable message. Diagnostic detail (status
//! codes, raw upstream bodies, credential sources) is logged server-side and
//! never carried in the message.
//!
//! [`FunctionError`] implements [`IntoResponse`], rendering the callable
//! protocol's error envelope:
//!
//! ```json
//! { "error": { "status": "INVALID_ARGUMENT", "message": "..." } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// The fixed failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The caller sent a missing or malformed payload.
    InvalidArgument,
    /// The caller, or the proxy's own credential, was rejected.
    Unauthenticated,
    /// The completion API is rate limiting us.
    ResourceExhausted,
    /// Anything the caller cannot fix: configuration faults, upstream outages,
    /// network failures, malformed completions.
    Internal,
}

impl ErrorKind {
    /// Wire tag used in the error envelope's `status` field.
    pub fn tag(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP status the callable protocol pairs with each tag.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A typed failure returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FunctionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FunctionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        tracing::warn!(kind = %self.kind, message = %self.message, "invocation failed");
        (
            self.kind.http_status(),
            Json(json!({
                "error": {
                    "status": self.kind.tag(),
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    // -----------------------------------------------------------------------
    // IntoResponse
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn into_response_renders_error_envelope() {
        let response = FunctionError::invalid_argument("bad input").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["status"], "INVALID_ARGUMENT");
        assert_eq!(json["error"]["message"], "bad input");
    }

    #[tokio::test]
    async fn envelope_carries_no_extra_fields() {
        let response = FunctionError::internal("boom").into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["error"].as_object().unwrap().len(), 2);
    }

    // -----------------------------------------------------------------------
    // ErrorKind mapping
    // -----------------------------------------------------------------------

    #[test]
    fn each_kind_maps_to_its_callable_status() {
        let cases = [
            (ErrorKind::InvalidArgument, StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            (ErrorKind::Unauthenticated, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            (ErrorKind::ResourceExhausted, StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED"),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        ];
        for (kind, status, tag) in cases {
            assert_eq!(kind.http_status(), status, "{kind:?}");
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn kind_serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&ErrorKind::ResourceExhausted).unwrap();
        assert_eq!(s, "\"RESOURCE_EXHAUSTED\"");
    }

    #[test]
    fn display_includes_tag_and_message() {
        let err = FunctionError::unauthenticated("nope");
        assert_eq!(err.to_string(), "UNAUTHENTICATED: nope");
    }
}
