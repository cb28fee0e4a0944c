//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]        # model gateway
//! [agent]      # orchestration loop limits and timeouts
//! [server]     # HTTP shell
//! [storage]    # conversation store
//! [logging]    # log output
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub llm: Option<LlmConfig>,
    pub agent: Option<AgentSection>,
    pub server: Option<ServerSection>,
    pub storage: Option<StorageConfig>,
    pub logging: Option<LoggingConfig>,
}

impl BeaconConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: BeaconConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.agent.is_some() {
            self.agent = other.agent;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    pub fn llm_or_default(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn agent_or_default(&self) -> AgentSection {
        self.agent.clone().unwrap_or_default()
    }

    pub fn server_or_default(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    pub fn storage_or_default(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    pub fn logging_or_default(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Supported model backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Anthropic,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Anthropic => "Anthropic",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Configuration for the model gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider.
    pub backend: Option<Backend>,
    /// Model identifier.
    pub model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer an env var; warns if set here).
    pub api_key: Option<String>,
    /// Maximum tokens per model response.
    pub max_tokens: Option<u32>,
    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }

    /// Resolve the API key: config value first, then the backend's env var.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }

        let backend = self.backend();
        match std::env::var(backend.env_var()) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::ApiKeyNotFound {
                backend: backend.to_string(),
                env_var: backend.env_var().to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What a failed tool call inside a program does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramFailure {
    /// The first failed call aborts the program.
    #[default]
    Abort,
    /// A failed call raises an error the program can `try`/`catch`.
    Catch,
}

/// Orchestration loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Maximum model rounds per turn.
    pub max_rounds: u32,
    /// Per model call timeout, in seconds.
    pub model_timeout_secs: u64,
    /// Per tool call timeout, in seconds.
    pub tool_timeout_secs: u64,
    /// Whole-program timeout, in seconds.
    pub program_timeout_secs: u64,
    /// Retries for transient model failures.
    pub model_retries: u32,
    /// Retries for transient failures of idempotent tools.
    pub tool_retries: u32,
    /// Initial backoff between retries, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Messages of history included in each model request.
    pub history_limit: usize,
    /// Stream event buffer size.
    pub event_buffer: usize,
    pub program_failure: ProgramFailure,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_rounds: 10,
            model_timeout_secs: 120,
            tool_timeout_secs: 30,
            program_timeout_secs: 60,
            model_retries: 2,
            tool_retries: 2,
            retry_backoff_ms: 500,
            history_limit: 20,
            event_buffer: 64,
            program_failure: ProgramFailure::Abort,
        }
    }
}

impl AgentSection {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn program_timeout(&self) -> Duration {
        Duration::from_secs(self.program_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.max_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.event_buffer".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP shell configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Allowed CORS origins (empty allows any).
    pub cors_origins: Vec<String>,
    /// Enable request logging.
    pub request_logging: bool,
    /// Cancel the turn when a streaming client disconnects.
    pub cancel_on_disconnect: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            cors_origins: Vec::new(),
            request_logging: true,
            cancel_on_disconnect: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Conversation store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Conversation store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file for the SQLite backend. Defaults to `<config dir>/beacon.db`.
    pub path: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
    /// Write JSON logs to a daily rolling file.
    pub file: bool,
    /// Directory for log files. Defaults to `<config dir>/logs`.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = BeaconConfig::from_toml(
            r#"
[llm]
backend = "anthropic"
model = "claude-test"

[agent]
max_rounds = 4
program_failure = "catch"

[server]
port = 9090
cancel_on_disconnect = true

[storage]
backend = "sqlite"
path = "/tmp/beacon.db"
"#,
        )
        .unwrap();

        assert_eq!(config.llm.as_ref().unwrap().model.as_deref(), Some("claude-test"));
        let agent = config.agent_or_default();
        assert_eq!(agent.max_rounds, 4);
        assert_eq!(agent.program_failure, ProgramFailure::Catch);
        // unspecified fields keep their defaults
        assert_eq!(agent.history_limit, 20);
        assert!(config.server_or_default().cancel_on_disconnect);
        assert_eq!(config.storage_or_default().backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_defaults() {
        let config = BeaconConfig::new();
        assert_eq!(config.server_or_default().port, DEFAULT_PORT);
        assert_eq!(config.agent_or_default().max_rounds, 10);
        assert_eq!(config.agent_or_default().program_failure, ProgramFailure::Abort);
        assert_eq!(config.storage_or_default().backend, StorageBackend::Memory);
        assert!(!config.server_or_default().cancel_on_disconnect);
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = BeaconConfig::from_toml("[server]\nport = 1000\n[agent]\nmax_rounds = 3\n").unwrap();
        let overlay = BeaconConfig::from_toml("[server]\nport = 2000\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.server_or_default().port, 2000);
        assert_eq!(base.agent_or_default().max_rounds, 3);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = BeaconConfig::new();
        config.agent = Some(AgentSection::default());
        let text = config.to_toml().unwrap();
        assert_eq!(BeaconConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let llm = LlmConfig {
            api_key: Some("sk-config".to_string()),
            ..Default::default()
        };
        assert_eq!(llm.resolve_api_key().unwrap(), "sk-config");
    }

    #[test]
    fn test_validate_rejects_zero_rounds() {
        let agent = AgentSection {
            max_rounds: 0,
            ..Default::default()
        };
        assert!(matches!(
            agent.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
