//! Configuration types for mahoro-proxy.
//!
//! Config is optional: when `MAHORO_CONFIG` is unset the built-in defaults are
//! used, which is the normal case on a managed host. When a path is given it is
//! loaded once at startup and validated before the server opens its port.
//!
//! The completion API credential is deliberately **not** part of this file;
//! see [`crate::credentials`].
//!
//! # Example
//! ```toml
//! [function]
//! name         = "mahoroChat"
//! port         = 8080
//! timeout_secs = 60
//! require_auth = false
//!
//! [upstream]
//! base_url = "https://api.anthropic.com"
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub function: FunctionConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective config from the process environment.
    ///
    /// - `MAHORO_CONFIG` names a TOML file; unset means defaults.
    /// - `PORT` (injected by managed hosts) overrides `function.port`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("MAHORO_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))
                .with_context(|| format!("Failed to load config from {path}"))?,
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var("PORT") {
            config.function.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let name = &self.function.name;
        anyhow::ensure!(!name.is_empty(), "function name must not be empty");
        anyhow::ensure!(
            !name.contains('/'),
            "function name `{name}` must be a single path segment"
        );
        anyhow::ensure!(
            self.function.timeout_secs > 0,
            "function timeout_secs must be greater than zero"
        );

        let base_url = &self.upstream.base_url;
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "upstream base_url `{base_url}` must start with http:// or https://"
        );

        Ok(())
    }
}

/// How the function is exposed by the host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionConfig {
    /// Callable name; served at `POST /{name}` (default: `mahoroChat`).
    #[serde(default = "defaults::function_name")]
    pub name: String,

    /// Listening port (default: 8080). Overridden by the `PORT` env var.
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Host-level invocation timeout in seconds (default: 60).
    ///
    /// When it elapses the in-flight invocation, including any outstanding
    /// completion call, is dropped.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Reject invocations that carry no caller identity (default: false).
    #[serde(default)]
    pub require_auth: bool,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            name: defaults::function_name(),
            port: defaults::port(),
            timeout_secs: defaults::timeout_secs(),
            require_auth: false,
        }
    }
}

/// Where the completion API lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL without the `/v1/messages` path (default: Anthropic's public API).
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { base_url: defaults::base_url() }
    }
}

mod defaults {
    pub fn function_name() -> String { "mahoroChat".into() }
    pub fn port() -> u16 { 8080 }
    pub fn timeout_secs() -> u64 { 60 }
    pub fn base_url() -> String { crate::upstream::DEFAULT_BASE_URL.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Parsing & defaults
    // -----------------------------------------------------------------------

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.function.name, "mahoroChat");
        assert_eq!(config.function.port, 8080);
        assert_eq!(config.function.timeout_secs, 60);
        assert!(!config.function.require_auth);
        assert_eq!(config.upstream.base_url, "https://api.anthropic.com");
        config.validate().expect("defaults should be valid");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            [function]
            name         = "chat"
            port         = 9000
            timeout_secs = 30
            require_auth = true

            [upstream]
            base_url = "http://localhost:4010"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.function.name, "chat");
        assert_eq!(config.function.port, 9000);
        assert_eq!(config.function.timeout_secs, 30);
        assert!(config.function.require_auth);
        assert_eq!(config.upstream.base_url, "http://localhost:4010");
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn validation_rejects_empty_function_name() {
        let mut config = Config::default();
        config.function.name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_function_name_with_slash() {
        let mut config = Config::default();
        config.function.name = "a/b".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_timeout() {
        let mut config = Config::default();
        config.function.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_base_url_without_scheme() {
        let mut config = Config::default();
        config.upstream.base_url = "api.anthropic.com".into();
        assert!(config.validate().is_err());
    }

    // -----------------------------------------------------------------------
    // Loading from disk
    // -----------------------------------------------------------------------

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here/mahoro.toml")).unwrap_err();
        assert!(err.to_string().contains("reading"), "got: {err}");
    }

    #[test]
    fn load_reads_and_validates_file() {
        let path = std::env::temp_dir().join(format!("mahoro-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[function]\nport = 7070\n").unwrap();

        let config = Config::load(&path).expect("file should load");
        assert_eq!(config.function.port, 7070);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("mahoro-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[function]\ntimeout_secs = 0\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_file(&path).ok();
    }
}
