//! Configuration management for gradle-cache

pub mod schema;

pub use schema::{Config, ExtractedEntryDefinition};

use crate::error::{GradleCacheError, GradleCacheResult};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gradle-cache")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gradle-cache")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> GradleCacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> GradleCacheResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            GradleCacheError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| GradleCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> GradleCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GradleCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            GradleCacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Resolve the Gradle User Home: config, then `$GRADLE_USER_HOME`, then `~/.gradle`
    pub fn gradle_user_home(config: &Config) -> GradleCacheResult<PathBuf> {
        if let Some(ref home) = config.paths.gradle_user_home {
            return Ok(home.clone());
        }
        if let Some(home) = env::var_os("GRADLE_USER_HOME").filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        dirs::home_dir()
            .map(|home| home.join(".gradle"))
            .ok_or(GradleCacheError::GradleHomeUnknown)
    }

    /// Resolve the project root, defaulting to the current directory
    pub fn project_root(config: &Config) -> GradleCacheResult<PathBuf> {
        match config.paths.project_root {
            Some(ref root) => Ok(root.clone()),
            None => env::current_dir()
                .map_err(|e| GradleCacheError::io("getting current directory", e)),
        }
    }

    /// Resolve the restore-to-save state file
    ///
    /// Prefers `$RUNNER_TEMP` so the file lives exactly as long as the job.
    pub fn state_file(config: &Config) -> PathBuf {
        if let Some(ref path) = config.paths.state_file {
            return path.clone();
        }
        match env::var_os("RUNNER_TEMP").filter(|v| !v.is_empty()) {
            Some(tmp) => PathBuf::from(tmp).join("gradle-cache-state.json"),
            None => Self::state_dir().join("state.json"),
        }
    }

    /// Resolve the local cache store root
    pub fn store_dir(config: &Config) -> PathBuf {
        config
            .paths
            .store_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("store"))
    }

    /// Resolve the branch this run saves into
    pub fn branch(config: &Config) -> Option<String> {
        config
            .scope
            .branch
            .clone()
            .or_else(|| env::var("GITHUB_REF_NAME").ok().filter(|v| !v.is_empty()))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
