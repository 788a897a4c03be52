//! Process-wide initialization.
//!
//! [`Platform::init`] runs once at process start and is the only place that
//! touches the host environment. Handlers receive a shared `&Platform` and can
//! do exactly two things with it: resolve the completion API credential and
//! reach the completion API.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::{
    config::Config,
    credentials::{Credential, CredentialChain},
    runtime_config::RuntimeConfig,
    upstream::CompletionClient,
};

/// Capabilities shared read-only by every invocation.
pub struct Platform {
    credentials: CredentialChain,
    completion: CompletionClient,
    require_auth: bool,
}

impl Platform {
    /// Build the shared HTTP client, load the legacy runtime config and
    /// assemble the standard credential chain.
    pub fn init(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("building reqwest client")?;
        let runtime_config = Arc::new(RuntimeConfig::load_default());

        let platform = Self::with_parts(
            CredentialChain::standard(runtime_config),
            CompletionClient::new(client, &config.upstream.base_url),
            config.function.require_auth,
        );
        info!(upstream = %platform.completion.url(), "platform initialised");
        Ok(platform)
    }

    /// Assemble a platform from explicit parts.
    pub fn with_parts(
        credentials: CredentialChain,
        completion: CompletionClient,
        require_auth: bool,
    ) -> Self {
        Self { credentials, completion, require_auth }
    }

    /// Run the credential lookup chain. Never cached.
    pub fn credential(&self) -> Option<Credential> {
        self.credentials.resolve()
    }

    pub fn completion_client(&self) -> &CompletionClient {
        &self.completion
    }

    /// Whether invocations must carry a caller identity.
    pub fn require_auth(&self) -> bool {
        self.require_auth
    }
}
