//! Configuration system for Beacon.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (user config dir + project-local overrides)
//! - Sections for the model gateway, the orchestration loop, the HTTP
//!   shell, conversation storage, and logging
//! - API key resolution (config file → env var) with plaintext warnings

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigSource, LoadedConfig, config_dir, load_config, load_config_file,
    load_layers, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
