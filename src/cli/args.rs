//! CLI argument definitions using clap derive

use crate::config::Config;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gradle-cache - Gradle build state caching for CI
///
/// Run `restore` at the start of a job and `save` at the end.
#[derive(Parser, Debug)]
#[command(name = "gradle-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GRADLE_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub flags: CacheFlags,
}

/// Run switches that override the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct CacheFlags {
    /// Disable caching entirely
    #[arg(long, global = true, env = "GRADLE_CACHE_DISABLED")]
    pub disabled: bool,

    /// Restore only, never save
    #[arg(long, global = true, env = "GRADLE_CACHE_READ_ONLY", conflicts_with = "write_only")]
    pub read_only: bool,

    /// Save only, never restore
    #[arg(long, global = true, env = "GRADLE_CACHE_WRITE_ONLY")]
    pub write_only: bool,

    /// Only fall back to entries from the same job instance
    #[arg(long, global = true, env = "GRADLE_CACHE_STRICT_MATCH")]
    pub strict_match: bool,

    /// Sequential restores and debug logging
    #[arg(long, global = true, env = "GRADLE_CACHE_DEBUG")]
    pub debug_cache: bool,

    /// Run Gradle's cache cleanup before saving
    #[arg(long, global = true, env = "GRADLE_CACHE_CLEANUP")]
    pub cleanup: bool,

    /// Extracted artifact types to skip restoring (comma-separated)
    #[arg(long, global = true, env = "GRADLE_CACHE_SKIP_RESTORE", value_delimiter = ',')]
    pub skip_restore: Vec<String>,
}

impl CacheFlags {
    /// Layer the flags over a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        let cache = &mut config.cache;
        cache.disabled |= self.disabled;
        cache.read_only |= self.read_only;
        cache.write_only |= self.write_only;
        cache.strict_match |= self.strict_match;
        cache.debug |= self.debug_cache;
        cache.cleanup |= self.cleanup;

        for artifact_type in &self.skip_restore {
            let artifact_type = artifact_type.trim();
            if !artifact_type.is_empty() && !cache.skip_restore.iter().any(|t| t == artifact_type) {
                cache.skip_restore.push(artifact_type.to_string());
            }
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore cached Gradle state (start of job)
    Restore,

    /// Save Gradle state to the cache (end of job)
    Save,

    /// Show the cache report for this job
    Report(ReportArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the report command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Entry names only (one per line)
    Plain,
}
