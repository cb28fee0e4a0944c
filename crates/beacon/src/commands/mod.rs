//! CLI command handlers.

pub mod ask;
pub mod config;
pub mod serve;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use beacon_agent::{Agent, AgentConfig, ToolFailurePolicy, builtin_registry};
use beacon_config::{
    AgentSection, BeaconConfig, LlmConfig, LoadedConfig, ProgramFailure,
    StorageBackend, StorageConfig,
};
use beacon_llm::{AnthropicConfig, SharedGateway, anthropic::create_shared_gateway};
use beacon_session::{MemoryStore, SharedStore, SqliteStore};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn config(&self) -> &BeaconConfig {
        &self.loaded.config
    }
}

/// Load an explicit config file, or discover and merge the default layers.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    Ok(match path {
        Some(path) => LoadedConfig::from_file(path)?,
        None => beacon_config::load_config(None)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Map the `[agent]` section onto the loop's runtime settings.
pub fn agent_config(section: &AgentSection) -> Result<AgentConfig> {
    section.validate()?;

    let mut config = AgentConfig::new()
        .with_max_rounds(section.max_rounds)
        .with_model_timeout(section.model_timeout())
        .with_tool_timeout(section.tool_timeout())
        .with_program_timeout(section.program_timeout())
        .with_retries(section.model_retries, section.retry_backoff())
        .with_tool_retries(section.tool_retries)
        .with_history_limit(section.history_limit)
        .with_event_buffer(section.event_buffer)
        .with_tool_failure(match section.program_failure {
            ProgramFailure::Abort => ToolFailurePolicy::Abort,
            ProgramFailure::Catch => ToolFailurePolicy::Catch,
        });

    if let Some(prompt) = &section.system_prompt {
        config = config.with_system_prompt(prompt.clone());
    }

    Ok(config)
}

/// Open the configured conversation store.
pub fn open_store(storage: &StorageConfig) -> Result<SharedStore> {
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let path = match &storage.path {
                Some(path) => path.clone(),
                None => beacon_config::config_dir()
                    .context("no config directory; set storage.path")?
                    .join("beacon.db"),
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            tracing::info!(path = %path.display(), "Opening SQLite conversation store");
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}

/// Build the model gateway from the `[llm]` section.
pub fn create_gateway(llm: &LlmConfig) -> Result<SharedGateway> {
    let api_key = llm.resolve_api_key()?;

    let mut config = AnthropicConfig::new(api_key);
    if let Some(model) = &llm.model {
        config = config.with_model(model.clone());
    }
    if let Some(base_url) = &llm.base_url {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(max_tokens) = llm.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(secs) = llm.timeout_secs {
        config = config.with_timeout(std::time::Duration::from_secs(secs));
    }

    Ok(create_shared_gateway(config)?)
}

/// Assemble an agent over the built-in tools from the loaded config.
pub fn build_agent(config: &BeaconConfig) -> Result<Agent> {
    let agent_config = agent_config(&config.agent_or_default())?;
    let gateway = create_gateway(&config.llm_or_default())?;
    let store = open_store(&config.storage_or_default())?;

    let agent = Agent::builder()
        .with_shared_gateway(gateway)
        .with_tools(builtin_registry())
        .with_store(store)
        .with_config(agent_config)
        .build()?;

    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_agent_config_mapping() {
        let section = AgentSection {
            max_rounds: 4,
            tool_timeout_secs: 7,
            retry_backoff_ms: 250,
            tool_retries: 0,
            program_failure: ProgramFailure::Catch,
            system_prompt: Some("Be brief.".to_string()),
            ..AgentSection::default()
        };

        let config = agent_config(&section).unwrap();
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.tool_timeout, Duration::from_secs(7));
        assert_eq!(config.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.tool_retries, 0);
        assert_eq!(config.tool_failure, ToolFailurePolicy::Catch);
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_agent_config_rejects_zero_rounds() {
        let section = AgentSection {
            max_rounds: 0,
            ..AgentSection::default()
        };
        assert!(agent_config(&section).is_err());
    }

    #[test]
    fn test_open_sqlite_store_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("beacon.db");
        let storage = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(path.clone()),
        };

        open_store(&storage).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_gateway_needs_api_key() {
        let llm = LlmConfig {
            api_key: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        // Blank config key falls through to the env var, which tests may not set.
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(create_gateway(&llm).is_err());
        }

        let llm = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        assert!(create_gateway(&llm).is_ok());
    }
}
