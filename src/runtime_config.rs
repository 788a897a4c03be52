//! Legacy platform-managed runtime configuration.
//!
//! Older deployments kept the completion API key in the host's runtime config
//! (`claude.api_key`) instead of an environment variable. The host materialises
//! that config as a JSON document, located via `CLOUD_RUNTIME_CONFIG` or
//! `.runtimeconfig.json` in the working directory:
//!
//! ```json
//! { "claude": { "api_key": "sk-ant-..." } }
//! ```
//!
//! A missing document is normal on current deployments and yields an empty
//! config. A broken document is logged and also treated as empty, so the
//! credential chain simply moves on.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

const PATH_ENV: &str = "CLOUD_RUNTIME_CONFIG";
const DEFAULT_FILE: &str = ".runtimeconfig.json";

/// Read-only view of the legacy runtime config document.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    root: Option<Value>,
}

impl RuntimeConfig {
    pub fn from_value(root: Value) -> Self {
        Self { root: Some(root) }
    }

    /// Load from `CLOUD_RUNTIME_CONFIG`, falling back to `.runtimeconfig.json`.
    pub fn load_default() -> Self {
        let path = std::env::var_os(PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no legacy runtime config present");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "legacy runtime config unreadable — ignoring");
                return Self::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(root) => Self::from_value(root),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "legacy runtime config is not valid JSON — ignoring");
                Self::default()
            }
        }
    }

    /// Look up a dotted path such as `claude.api_key`. Only string leaves match.
    pub fn get(&self, dotted: &str) -> Option<&str> {
        dotted
            .split('.')
            .try_fold(self.root.as_ref()?, |node, key| node.get(key))?
            .as_str()
    }
}
