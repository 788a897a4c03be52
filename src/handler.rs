//! The chat function itself.
//!
//! [`handle`] is one linear pipeline per invocation:
//!
//! 1. unwrap the payload (`{data: X}` and `X` are treated identically)
//! 2. validate `message`, read `systemPrompt` and `conversationHistory`
//! 3. resolve the completion API credential
//! 4. build the Messages request (history + new user turn)
//! 5. call the completion API once
//! 6. translate the reply, or classify the failure into a [`FunctionError`]
//!
//! There is no retry, backoff or timeout here; the host's invocation timeout
//! is the only cancellation.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    error::FunctionError,
    platform::Platform,
    upstream::{Message, MessagesRequest, MessagesResponse, UpstreamError, MAX_TOKENS, MODEL},
};

/// Persona used when the caller sends no `systemPrompt`.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Mahoro, a supportive AI companion for mental health. Respond with empathy and care.";

const MSG_NO_DATA: &str = "No data received. Please try again.";
const MSG_BAD_MESSAGE: &str = "Message is required and must be a non-empty string";
const MSG_NOT_AUTHENTICATED: &str = "User must be authenticated to use Mahoro";
const MSG_NO_API_KEY: &str = "API key not configured. Please contact support.";
const MSG_UPSTREAM_401: &str = "Invalid API key. Please contact support.";
const MSG_UPSTREAM_429: &str = "Rate limit exceeded. Please wait a moment and try again.";
const MSG_UPSTREAM_5XX: &str = "Completion API is temporarily unavailable. Please try again later.";
const MSG_NO_CONTENT: &str = "No response from completion API";
const MSG_NETWORK: &str = "Network error. Please check your internet connection and try again.";
const MSG_GENERIC: &str = "Failed to get response from completion API. Please try again.";

/// Identity the host attached to the invocation.
#[derive(Clone)]
pub struct CallerAuth {
    pub token: String,
}

impl std::fmt::Debug for CallerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallerAuth(<redacted>)")
    }
}

/// Per-invocation context supplied by the host.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub execution_id: String,
    pub auth: Option<CallerAuth>,
    pub received_at: DateTime<Utc>,
}

impl InvocationContext {
    pub fn new(execution_id: impl Into<String>, auth: Option<CallerAuth>) -> Self {
        Self {
            execution_id: execution_id.into(),
            auth,
            received_at: Utc::now(),
        }
    }
}

/// Successful result returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub model: String,
}

/// The validated fields of an effective payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub system_prompt: Option<String>,
    pub history: Vec<Message>,
}

impl ChatRequest {
    /// Extract and validate `message`, `systemPrompt` and `conversationHistory`.
    ///
    /// `message` must be a string that is non-empty after trimming; it is kept
    /// as sent. A `conversationHistory` that is not an array of
    /// `{role: "user"|"assistant", content: string}` is treated as empty.
    pub fn from_payload(payload: &Value) -> Result<Self, FunctionError> {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                error!(message_type = json_type(payload.get("message")), "invalid message");
                FunctionError::invalid_argument(MSG_BAD_MESSAGE)
            })?;

        let system_prompt = payload
            .get("systemPrompt")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(String::from);

        let history = match payload.get("conversationHistory") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => {
                match entries.iter().map(Message::deserialize).collect::<Result<Vec<_>, _>>() {
                    Ok(history) => history,
                    Err(e) => {
                        let invalid = entries
                            .iter()
                            .filter(|entry| Message::deserialize(*entry).is_err())
                            .count();
                        warn!(
                            error = %e,
                            dropped = entries.len(),
                            invalid,
                            "conversationHistory has malformed entries — dropping the whole history"
                        );
                        Vec::new()
                    }
                }
            }
            Some(other) => {
                warn!(history_type = json_type(Some(other)), "conversationHistory is not an array — ignoring it");
                Vec::new()
            }
        };

        Ok(Self {
            message: message.to_string(),
            system_prompt,
            history,
        })
    }
}

/// Resolve the payload actually used for validation.
///
/// An object with a `data` key is unwrapped one level (older and newer
/// callable clients disagree on wrapping). `None` when nothing usable remains.
pub fn effective_payload(payload: &Value) -> Option<&Value> {
    let effective = payload
        .as_object()
        .and_then(|map| map.get("data"))
        .unwrap_or(payload);
    (!effective.is_null()).then_some(effective)
}

/// Prior turns in their original order, followed by the new user turn.
pub fn assemble_messages(history: Vec<Message>, message: &str) -> Vec<Message> {
    let mut messages = history;
    messages.push(Message::user(message));
    messages
}

pub fn build_request(request: ChatRequest) -> MessagesRequest {
    MessagesRequest {
        model: MODEL.to_string(),
        max_tokens: MAX_TOKENS,
        system: request
            .system_prompt
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        messages: assemble_messages(request.history, &request.message),
    }
}

/// Turn a 2xx completion into a reply. Only the first content block is used.
pub fn interpret_response(response: MessagesResponse) -> Result<ChatReply, FunctionError> {
    match response.content.into_iter().next() {
        Some(block) if !block.text.is_empty() => Ok(ChatReply {
            response: block.text,
            model: response.model,
        }),
        _ => {
            error!(model = %response.model, "completion had no usable text content");
            Err(FunctionError::internal(MSG_NO_CONTENT))
        }
    }
}

/// Map a non-2xx completion API status onto the caller-facing taxonomy.
pub fn classify_status(status: StatusCode) -> FunctionError {
    match status {
        StatusCode::UNAUTHORIZED => FunctionError::unauthenticated(MSG_UPSTREAM_401),
        StatusCode::TOO_MANY_REQUESTS => FunctionError::resource_exhausted(MSG_UPSTREAM_429),
        s if s.is_server_error() => FunctionError::internal(MSG_UPSTREAM_5XX),
        s => FunctionError::internal(format!("Completion API error: {}", s.as_u16())),
    }
}

fn classify_upstream_error(err: UpstreamError) -> FunctionError {
    match err {
        UpstreamError::Status { status, body } => {
            error!(%status, %body, "completion API error");
            classify_status(status)
        }
        UpstreamError::Transport(e) => {
            error!(error = %e, "network error calling completion API");
            FunctionError::internal(MSG_NETWORK)
        }
        other => {
            error!(error = %other, "error calling completion API");
            FunctionError::internal(MSG_GENERIC)
        }
    }
}

/// Run one chat invocation.
///
/// # Errors
/// Every failure is a [`FunctionError`] whose message is safe to show the
/// caller; details go to the server log only.
#[tracing::instrument(skip_all, fields(execution_id = %ctx.execution_id))]
pub async fn handle(
    platform: &Platform,
    payload: Value,
    ctx: &InvocationContext,
) -> Result<ChatReply, FunctionError> {
    debug!(
        authenticated = ctx.auth.is_some(),
        token_len = ctx.auth.as_ref().map_or(0, |a| a.token.len()),
        "chat function called"
    );

    if platform.require_auth() && ctx.auth.is_none() {
        return Err(FunctionError::unauthenticated(MSG_NOT_AUTHENTICATED));
    }

    let payload = effective_payload(&payload).ok_or_else(|| {
        error!("no data received in function call");
        FunctionError::invalid_argument(MSG_NO_DATA)
    })?;
    log_payload_shape(payload);

    let request = ChatRequest::from_payload(payload)?;

    let credential = platform
        .credential()
        .ok_or_else(|| FunctionError::internal(MSG_NO_API_KEY))?;
    debug!(len = credential.len(), "API key retrieved");

    let upstream_request = build_request(request);
    let response = platform
        .completion_client()
        .create_message(&credential, &upstream_request)
        .await
        .map_err(classify_upstream_error)?;

    let reply = interpret_response(response)?;
    let elapsed_ms = (Utc::now() - ctx.received_at).num_milliseconds();
    info!(model = %reply.model, elapsed_ms, "chat reply generated");
    Ok(reply)
}

fn log_payload_shape(payload: &Value) {
    let keys: Vec<&str> = payload
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    let message_len = payload.get("message").and_then(Value::as_str).map_or(0, str::len);
    let has_system_prompt = payload.get("systemPrompt").is_some_and(|p| !p.is_null());
    let history_len = payload
        .get("conversationHistory")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    debug!(keys = ?keys, message_len, has_system_prompt, history_len, "payload received");
}

fn json_type(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
