//! Error types for gradle-cache
//!
//! All modules use `GradleCacheResult<T>` as their return type. Cache
//! provider failures have their own type (`cache::ProviderError`) and are
//! only promoted into this enum when they are fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gradle-cache operations
pub type GradleCacheResult<T> = Result<T, GradleCacheError>;

/// All errors that can occur in gradle-cache
#[derive(Error, Debug)]
pub enum GradleCacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gradle User Home could not be determined")]
    GradleHomeUnknown,

    // Cache protocol errors
    #[error("Cache validation failed: {0}")]
    CacheValidation(String),

    #[error("Invalid cache path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    // Phase handoff errors
    #[error("Failed to persist cache state: {0}")]
    StatePersist(String),

    #[error("Cache state file is corrupt at {path}: {reason}")]
    StateCorrupt { path: PathBuf, reason: String },

    // Cleanup errors
    #[error("Cache cleanup failed: {0}")]
    Cleanup(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GradleCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::GradleHomeUnknown => {
                Some("Set paths.gradle_user_home in the config file or export GRADLE_USER_HOME")
            }
            Self::CommandFailed { .. } => {
                Some("Check paths.gradle_executable points at a runnable Gradle")
            }
            Self::StateCorrupt { .. } => Some("Delete the state file and re-run the restore step"),
            Self::CacheValidation(_) => {
                Some("Cache keys must be non-empty, at most 512 characters and contain no commas")
            }
            _ => None,
        }
    }
}
