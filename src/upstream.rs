//! Claude Messages API client.
//!
//! One call shape only: a non-streaming [`/v1/messages`](https://docs.anthropic.com/en/api/messages)
//! request with a top-level `system` prompt and a plain-text message list.
//!
//! | Concern | Value |
//! |---|---|
//! | Endpoint | `POST {base_url}/v1/messages` |
//! | Auth header | `x-api-key: …` |
//! | Version header | `anthropic-version: 2023-06-01` |
//! | Response text | `content[0].text` |
//!
//! The credential is resolved per invocation, so auth headers are attached per
//! request rather than baked into the client's default headers.

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};

use crate::credentials::Credential;

/// Anthropic's public API host.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Model every completion is requested from.
pub const MODEL: &str = "claude-sonnet-4-20250514";

/// Output ceiling for each reply.
pub const MAX_TOKENS: u32 = 1024;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MESSAGES_PATH: &str = "/v1/messages";

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Request body for `POST /v1/messages`. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
}

/// The parts of a successful response the proxy reads.
///
/// Missing and `null` fields both read as empty, so a well-formed reply with
/// no usable text is distinguishable from an unparseable one.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<ContentBlock>,
}

/// A content block. Non-text blocks deserialize with an empty `text`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why a completion call failed.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("completion API returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("transport error calling completion API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("parsing completion API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API key contains characters not allowed in a header")]
    InvalidCredential,
}

/// HTTP client for the completion API.
///
/// Holds a shared [`reqwest::Client`] built once at process start; cloning is
/// cheap since the client is internally reference-counted.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    url: String,
}

impl CompletionClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        let url = format!("{}{MESSAGES_PATH}", base_url.trim_end_matches('/'));
        Self { client, url }
    }

    /// Full endpoint URL, for logging.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one Messages API request and parse the reply.
    ///
    /// # Errors
    /// [`UpstreamError::Status`] for any non-2xx status (with the raw body for
    /// server-side logging), [`UpstreamError::Transport`] when the request or
    /// body read fails, [`UpstreamError::Decode`] when a 2xx body is not a
    /// Messages response.
    pub async fn create_message(
        &self,
        credential: &Credential,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, UpstreamError> {
        let api_key = header::HeaderValue::from_str(credential.expose())
            .map_err(|_| UpstreamError::InvalidCredential)?;

        let response = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(UpstreamError::Status { status, body: text });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
