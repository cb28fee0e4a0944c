//! Where beacon finds its settings.
//!
//! Two files are read and merged, the project file winning:
//! `config.toml` in the user config dir, then `beacon.toml` in the project
//! dir. The user config dir is `$BEACON_CONFIG_DIR` when set, otherwise
//! `~/.config/beacon`. Flags passed on the command line are applied later by
//! the binary.

use std::path::{Path, PathBuf};

use crate::{BeaconConfig, ConfigError, Result};

/// Overrides the user config dir.
pub const CONFIG_DIR_ENV: &str = "BEACON_CONFIG_DIR";

const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "beacon.toml";

/// A config file that was looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// Merged settings plus what went into them.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BeaconConfig,
    /// Every file looked at, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Broken files that were skipped and plaintext API keys.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Settings from one named file, with no merging.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut loaded = Self {
            config: load_config_file(path)?,
            sources: vec![ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }],
            warnings: Vec::new(),
        };
        loaded.warn_on_plaintext_key();
        Ok(loaded)
    }

    /// Paths that actually contributed settings.
    pub fn loaded_from(&self) -> impl Iterator<Item = &Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
    }

    /// Merge one file on top of what is loaded so far. A missing file is
    /// recorded; a broken one is recorded and skipped with a warning.
    fn layer(&mut self, path: PathBuf) {
        let loaded = path.is_file()
            && match load_config_file(&path) {
                Ok(settings) => {
                    self.config.merge(settings);
                    true
                }
                Err(e) => {
                    self.warnings
                        .push(format!("Skipped {}: {}", path.display(), e));
                    false
                }
            };
        self.sources.push(ConfigSource { path, loaded });
    }

    fn warn_on_plaintext_key(&mut self) {
        if let Some(llm) = &self.config.llm
            && llm.has_plaintext_api_key()
        {
            self.warnings.push(format!(
                "[llm] api_key is stored in plaintext; set {} instead",
                llm.backend().env_var()
            ));
        }
    }
}

/// Merge the user file and the project file.
///
/// `project_dir` defaults to the working directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_layers(config_dir().as_deref(), project_dir)
}

/// Merge the files found in explicit directories. A `user_dir` of `None`
/// skips the user layer.
pub fn load_layers(user_dir: Option<&Path>, project_dir: Option<&Path>) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: BeaconConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    if let Some(dir) = user_dir {
        loaded.layer(dir.join(USER_FILE));
    }
    loaded.layer(project_dir.map_or_else(|| PathBuf::from(PROJECT_FILE), |d| d.join(PROJECT_FILE)));
    loaded.warn_on_plaintext_key();

    Ok(loaded)
}

/// Parse one config file.
pub fn load_config_file(path: &Path) -> Result<BeaconConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    BeaconConfig::from_toml(&contents)
}

/// `config.toml` inside [`config_dir`].
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_FILE))
}

/// The user config dir; also the parent of the default log dir.
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join("beacon")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_nothing_to_load() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let loaded = load_layers(Some(user.path()), Some(project.path())).unwrap();
        assert!(loaded.config.llm.is_none());
        assert_eq!(loaded.sources.len(), 2);
        assert_eq!(loaded.loaded_from().count(), 0);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_project_file_wins() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(&user, "config.toml", "[server]\nport = 8080\n\n[agent]\nmax_rounds = 5\n");
        write(&project, "beacon.toml", "[server]\nport = 3000\n");

        let loaded = load_layers(Some(user.path()), Some(project.path())).unwrap();
        assert_eq!(loaded.config.server_or_default().port, 3000);
        assert_eq!(loaded.config.agent_or_default().max_rounds, 5);
        let paths: Vec<_> = loaded.loaded_from().collect();
        assert_eq!(
            paths,
            [
                user.path().join("config.toml").as_path(),
                project.path().join("beacon.toml").as_path()
            ]
        );
    }

    #[test]
    fn test_without_user_dir_only_project_is_read() {
        let project = TempDir::new().unwrap();
        write(&project, "beacon.toml", "[agent]\nmax_rounds = 3\n");

        let loaded = load_layers(None, Some(project.path())).unwrap();
        assert_eq!(loaded.sources.len(), 1);
        assert_eq!(loaded.config.agent_or_default().max_rounds, 3);
    }

    #[test]
    fn test_plaintext_key_warning() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(
            &project,
            "beacon.toml",
            "[llm]\nbackend = \"anthropic\"\napi_key = \"sk-ant-secret\"\n",
        );

        let loaded = load_layers(Some(user.path()), Some(project.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
        assert!(loaded.warnings[0].contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(&user, "config.toml", "[agent]\nmax_rounds = 4\n");
        write(&project, "beacon.toml", "not valid toml {{{{");

        let loaded = load_layers(Some(user.path()), Some(project.path())).unwrap();
        assert_eq!(loaded.config.agent_or_default().max_rounds, 4);
        assert_eq!(loaded.loaded_from().count(), 1);
        assert!(loaded.warnings[0].starts_with("Skipped"));
    }

    #[test]
    fn test_from_file_checks_key() {
        let dir = TempDir::new().unwrap();
        write(&dir, "custom.toml", "[llm]\napi_key = \"sk-ant-secret\"\n");

        let loaded = LoadedConfig::from_file(&dir.path().join("custom.toml")).unwrap();
        assert_eq!(loaded.loaded_from().count(), 1);
        assert!(loaded.warnings[0].contains("ANTHROPIC_API_KEY"));
    }
}
