//! Completion API credential resolution.
//!
//! The key can live in three places, depending on how old the deployment is.
//! [`CredentialChain`] tries each [`CredentialSource`] in priority order and the
//! first present, non-empty value wins:
//!
//! 1. `CLAUDE_API_KEY` environment variable
//! 2. `claude_api_key` environment variable
//! 3. `claude.api_key` in the legacy runtime config
//!
//! The chain runs on every invocation; nothing is cached. Source names only
//! ever reach server-side logs.

use std::sync::Arc;

use tracing::{debug, error};

use crate::runtime_config::RuntimeConfig;

/// A resolved completion API key.
///
/// `Debug` and `Display` are redacted; the raw value is only reachable through
/// [`Credential::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw secret, for building the auth header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(<redacted, {} chars>)", self.0.len())
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

/// One place a credential might be stored.
pub trait CredentialSource: Send + Sync {
    /// Human-readable location, used in server-side logs.
    fn name(&self) -> String;

    /// Current value at this location, if any.
    fn lookup(&self) -> Option<String>;
}

/// A process environment variable.
pub struct EnvVar(pub &'static str);

impl CredentialSource for EnvVar {
    fn name(&self) -> String {
        format!("env:{}", self.0)
    }

    fn lookup(&self) -> Option<String> {
        std::env::var(self.0).ok()
    }
}

/// A dotted key in the legacy runtime config.
pub struct RuntimeConfigValue {
    pub config: Arc<RuntimeConfig>,
    pub key: &'static str,
}

impl CredentialSource for RuntimeConfigValue {
    fn name(&self) -> String {
        format!("runtime_config:{}", self.key)
    }

    fn lookup(&self) -> Option<String> {
        self.config.get(self.key).map(String::from)
    }
}

/// Priority-ordered list of credential sources.
pub struct CredentialChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialChain {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// The production chain: both env var spellings, then the legacy config.
    pub fn standard(runtime_config: Arc<RuntimeConfig>) -> Self {
        Self::new(vec![
            Box::new(EnvVar("CLAUDE_API_KEY")),
            Box::new(EnvVar("claude_api_key")),
            Box::new(RuntimeConfigValue { config: runtime_config, key: "claude.api_key" }),
        ])
    }

    /// Try every source in order; the first non-empty value wins.
    pub fn resolve(&self) -> Option<Credential> {
        for source in &self.sources {
            match source.lookup().filter(|v| !v.is_empty()) {
                Some(value) => {
                    let credential = Credential::new(value);
                    debug!(source = %source.name(), len = credential.len(), "API key resolved");
                    return Some(credential);
                }
                None => debug!(source = %source.name(), "no API key at source"),
            }
        }

        let checked: Vec<String> = self.sources.iter().map(|s| s.name()).collect();
        error!(checked = ?checked, "completion API key not configured");
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    struct Fixed(Option<&'static str>);

    impl CredentialSource for Fixed {
        fn name(&self) -> String {
            "fixed".into()
        }

        fn lookup(&self) -> Option<String> {
            self.0.map(String::from)
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl CredentialSource for Counting {
        fn name(&self) -> String {
            "counting".into()
        }

        fn lookup(&self) -> Option<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some("late".into())
        }
    }

    // -----------------------------------------------------------------------
    // CredentialChain::resolve
    // -----------------------------------------------------------------------

    #[test]
    fn first_non_empty_source_wins() {
        let chain = CredentialChain::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some("second"))),
            Box::new(Fixed(Some("third"))),
        ]);
        assert_eq!(chain.resolve().unwrap().expose(), "second");
    }

    #[test]
    fn empty_values_are_skipped() {
        let chain = CredentialChain::new(vec![
            Box::new(Fixed(Some(""))),
            Box::new(Fixed(Some("real"))),
        ]);
        assert_eq!(chain.resolve().unwrap().expose(), "real");
    }

    #[test]
    fn later_sources_are_not_consulted_once_resolved() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = CredentialChain::new(vec![
            Box::new(Fixed(Some("early"))),
            Box::new(Counting(Arc::clone(&calls))),
        ]);
        assert_eq!(chain.resolve().unwrap().expose(), "early");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_chain_resolves_to_none() {
        let chain = CredentialChain::new(vec![Box::new(Fixed(None)), Box::new(Fixed(Some("")))]);
        assert!(chain.resolve().is_none());
    }

    #[test]
    fn empty_chain_resolves_to_none() {
        assert!(CredentialChain::new(Vec::new()).resolve().is_none());
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    #[test]
    fn env_var_source_reads_process_env() {
        // Unique var name to avoid cross-test interference.
        let var = "MAHORO_CREDENTIAL_TEST_KEY_7731";
        // SAFETY: single-threaded test setup; env mutation is acceptable here.
        unsafe { std::env::set_var(var, "sk-env") };
        assert_eq!(EnvVar(var).lookup().as_deref(), Some("sk-env"));
        unsafe { std::env::remove_var(var) };
        assert!(EnvVar(var).lookup().is_none());
    }

    #[test]
    fn runtime_config_source_reads_dotted_key() {
        let config = Arc::new(RuntimeConfig::from_value(json!({ "claude": { "api_key": "sk-legacy" } })));
        let source = RuntimeConfigValue { config, key: "claude.api_key" };
        assert_eq!(source.lookup().as_deref(), Some("sk-legacy"));
        assert_eq!(source.name(), "runtime_config:claude.api_key");
    }

    #[test]
    fn standard_chain_falls_back_to_runtime_config() {
        // Only meaningful when neither env spelling is set in the test environment.
        if std::env::var("CLAUDE_API_KEY").is_ok() || std::env::var("claude_api_key").is_ok() {
            return;
        }
        let config = Arc::new(RuntimeConfig::from_value(json!({ "claude": { "api_key": "sk-legacy" } })));
        let chain = CredentialChain::standard(config);
        assert_eq!(chain.resolve().unwrap().expose(), "sk-legacy");
    }

    // -----------------------------------------------------------------------
    // Credential redaction
    // -----------------------------------------------------------------------

    #[test]
    fn credential_debug_and_display_are_redacted() {
        let credential = Credential::new("sk-ant-secret");
        let debug = format!("{credential:?}");
        let display = credential.to_string();

        assert!(!debug.contains("sk-ant-secret"), "debug leaked: {debug}");
        assert!(debug.contains("13"), "debug should report length: {debug}");
        assert!(!display.contains("sk-ant-secret"), "display leaked: {display}");
    }
}
