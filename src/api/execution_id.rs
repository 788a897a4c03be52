//! Execution ID middleware.
//!
//! Every invocation gets a `function-execution-id`:
//!
//! - accepted from the caller when the header is already present (the host's
//!   front end usually sets it)
//! - otherwise freshly generated (UUID v4)
//! - stored as an axum [`Extension`](axum::Extension) for the handler
//! - echoed back in the response header
//! - attached to a [`tracing`] span so every log line for the invocation carries it

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument as _;
use uuid::Uuid;

pub const HEADER: &str = "function-execution-id";

/// Newtype wrapper carrying the assigned execution ID.
#[derive(Clone, Debug)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Axum middleware that assigns an [`ExecutionId`] to every request.
pub async fn execution_id_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| ExecutionId(v.to_string()))
        .unwrap_or_else(ExecutionId::generate);

    req.extensions_mut().insert(id.clone());

    let span = tracing::info_span!("invocation", execution_id = %id.0);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&id.0) {
        response.headers_mut().insert(HEADER, header_value);
    }

    response
}
