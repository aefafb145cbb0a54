//! Configuration schema for gradle-cache
//!
//! Configuration is stored at `~/.config/gradle-cache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache behaviour
    pub cache: CacheConfig,

    /// Filesystem locations
    pub paths: PathsConfig,

    /// Extracted entry definitions
    pub extract: ExtractConfig,

    /// Branch scoping for the local store
    pub scope: ScopeConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Skip both restore and save
    pub disabled: bool,

    /// Reason recorded in the report when disabled
    pub disabled_reason: Option<String>,

    /// Restore, but never save
    pub read_only: bool,

    /// Save, but never restore
    pub write_only: bool,

    /// Only fall back to entries from the same job instance
    pub strict_match: bool,

    /// Verbose cache logging and sequential extracted-entry restores
    pub debug: bool,

    /// Force Gradle cache cleanup before saving
    pub cleanup: bool,

    /// Prefix prepended to every cache key
    pub key_prefix: Option<String>,

    /// Job matrix description, hashed into the job instance id
    pub job_matrix: Option<String>,

    /// Gradle User Home paths (relative globs) cached by the "gradle" domain
    pub include: Vec<String>,

    /// Gradle User Home paths (relative globs) excluded from the "gradle" domain
    pub exclude: Vec<String>,

    /// Extracted artifact types that should not be restored
    pub skip_restore: Vec<String>,

    /// Save-time misses after which a stale extracted entry is forgotten
    pub stale_entry_max_misses: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            disabled_reason: None,
            read_only: false,
            write_only: false,
            strict_match: false,
            debug: false,
            cleanup: false,
            key_prefix: None,
            job_matrix: None,
            include: vec![
                "caches".to_string(),
                "notifications".to_string(),
                ".gradle-cache".to_string(),
            ],
            exclude: vec![],
            skip_restore: vec![],
            stale_entry_max_misses: 1,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Gradle User Home (defaults to `$GRADLE_USER_HOME` or `~/.gradle`)
    pub gradle_user_home: Option<PathBuf>,

    /// Root of the Gradle build (defaults to the current directory)
    pub project_root: Option<PathBuf>,

    /// File carrying state from the restore step to the save step
    pub state_file: Option<PathBuf>,

    /// Root directory of the local cache store
    pub store_dir: Option<PathBuf>,

    /// Gradle executable used for forced cleanup
    pub gradle_executable: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            gradle_user_home: None,
            project_root: None,
            state_file: None,
            store_dir: None,
            gradle_executable: "gradle".to_string(),
        }
    }
}

/// One extracted entry definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntryDefinition {
    /// Logical name of the artifact, used in keys and the report
    pub artifact_type: String,

    /// Glob relative to the Gradle User Home
    pub pattern: String,

    /// All matches form one entry (true) or each match is its own entry (false)
    #[serde(default)]
    pub bundle: bool,

    /// Matched file names identify content, so key on names instead of bytes
    #[serde(default)]
    pub unique_file_names: bool,
}

impl ExtractedEntryDefinition {
    pub fn new(artifact_type: &str, pattern: &str, bundle: bool, unique_file_names: bool) -> Self {
        Self {
            artifact_type: artifact_type.to_string(),
            pattern: pattern.to_string(),
            bundle,
            unique_file_names,
        }
    }
}

/// Extracted entry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Whether sub-entries are split out of the Gradle User Home at all
    pub enabled: bool,

    /// Follow symbolic links when matching extracted files
    pub follow_symlinks: bool,

    /// Definitions applied to the Gradle User Home
    pub entries: Vec<ExtractedEntryDefinition>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            follow_symlinks: false,
            entries: vec![
                ExtractedEntryDefinition::new(
                    "generated-gradle-jars",
                    "caches/*/generated-gradle-jars/*.jar",
                    true,
                    false,
                ),
                ExtractedEntryDefinition::new("wrapper-zips", "wrapper/dists/*/*", false, true),
                ExtractedEntryDefinition::new("java-toolchains", "jdks/*", false, true),
                ExtractedEntryDefinition::new(
                    "dependencies",
                    "caches/modules-*/files-*/*/*/*/*",
                    false,
                    true,
                ),
                ExtractedEntryDefinition::new(
                    "instrumented-jars",
                    "caches/jars-*/*",
                    false,
                    false,
                ),
                ExtractedEntryDefinition::new(
                    "kotlin-dsl",
                    "caches/*/kotlin-dsl/accessors/*",
                    false,
                    false,
                ),
                ExtractedEntryDefinition::new(
                    "transforms",
                    "caches/transforms-4/*",
                    false,
                    true,
                ),
            ],
        }
    }
}

/// Branch scoping for the local store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Branch this run saves into (defaults to `$GITHUB_REF_NAME`)
    pub branch: Option<String>,

    /// Branch whose entries are visible to every other branch
    pub default_branch: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            branch: None,
            default_branch: "main".to_string(),
        }
    }
}
