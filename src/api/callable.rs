//! Callable-function wire protocol.
//!
//! Request:  `POST /{name}` with `{"data": <payload>}`
//! Success:  `200 {"result": {"response": "...", "model": "..."}}`
//! Failure:  `{"error": {"status": "<KIND>", "message": "..."}}` (see [`FunctionError`])
//!
//! This layer only deals with the envelope and the caller's identity; all chat
//! semantics live in [`crate::handler`].

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Extension, Json,
};
use serde_json::{json, Value};

use super::execution_id::ExecutionId;
use crate::{
    error::FunctionError,
    handler::{self, CallerAuth, InvocationContext},
    platform::Platform,
};

/// `POST /{name}` — run one chat invocation.
pub async fn invoke(
    State(platform): State<Arc<Platform>>,
    execution_id: Option<Extension<ExecutionId>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, FunctionError> {
    let execution_id = execution_id
        .map(|Extension(id)| id)
        .unwrap_or_else(ExecutionId::generate);
    let ctx = InvocationContext::new(execution_id.0, caller_auth(&headers));

    let payload = decode_request(&body)?;
    let reply = handler::handle(&platform, payload, &ctx).await?;
    Ok(Json(json!({ "result": reply })))
}

/// Strip the protocol's `data` envelope. An empty body decodes to `null`.
pub fn decode_request(body: &[u8]) -> Result<Value, FunctionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let mut value: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "request body is not JSON");
        FunctionError::invalid_argument("Request body must be valid JSON.")
    })?;

    Ok(match value.as_object_mut().and_then(|map| map.remove("data")) {
        Some(data) => data,
        None => value,
    })
}

/// Caller identity from a non-empty `Authorization: Bearer <token>` header.
///
/// Token verification belongs to the host; only presence is observed here.
fn caller_auth(headers: &HeaderMap) -> Option<CallerAuth> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| CallerAuth { token: t.to_string() })
}
