//! Concrete cache domains
//!
//! - `gradle`: the Gradle User Home, with shared artifacts extracted into
//!   their own entries and the project configuration cache alongside.
//! - `project`: the project's `.gradle` directory, minus the configuration
//!   cache which only makes sense next to a matching Gradle User Home.

use crate::cache::extract::EntryExtractor;
use crate::cache::hash::rooted_pattern;
use crate::cache::orchestrator::{CacheContext, CacheDomain};
use crate::config::{Config, ConfigManager, ExtractedEntryDefinition};
use crate::error::{GradleCacheError, GradleCacheResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const GRADLE_HOME_DOMAIN: &str = "gradle";
pub const PROJECT_DOMAIN: &str = "project";

/// Home-relative directory holding extractor metadata
pub const METADATA_DIR: &str = ".gradle-cache";

const CONFIGURATION_CACHE_DIR: &str = "configuration-cache";

const HOME_LOCK_FILES: [&str; 2] = ["caches/**/*.lock", "notifications/**/*.lock"];
const PROJECT_LOCK_FILES: [&str; 1] = ["**/*.lock"];

/// The Gradle User Home domain
pub struct GradleHomeDomain {
    home: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    common_artifacts: Option<EntryExtractor>,
    configuration_cache: Option<EntryExtractor>,
}

impl GradleHomeDomain {
    pub fn new(home: impl Into<PathBuf>, include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            home: home.into(),
            include,
            exclude,
            common_artifacts: None,
            configuration_cache: None,
        }
    }

    pub fn from_config(config: &Config) -> GradleCacheResult<Self> {
        let home = ConfigManager::gradle_user_home(config)?;
        let mut domain = Self::new(
            &home,
            config.cache.include.clone(),
            config.cache.exclude.clone(),
        );

        if config.extract.enabled {
            let project_dir = ConfigManager::project_root(config)?.join(".gradle");
            domain.common_artifacts = Some(
                EntryExtractor::new(
                    &home,
                    metadata_file(&home, "common-artifacts"),
                    config.extract.entries.clone(),
                )
                .skip_restore(config.cache.skip_restore.clone())
                .max_misses(config.cache.stale_entry_max_misses)
                .follow_symlinks(config.extract.follow_symlinks),
            );
            domain.configuration_cache = Some(
                EntryExtractor::new(
                    project_dir,
                    metadata_file(&home, "configuration-cache"),
                    vec![ExtractedEntryDefinition::new(
                        "configuration-cache",
                        "configuration-cache/*",
                        false,
                        false,
                    )],
                )
                .skip_restore(config.cache.skip_restore.clone())
                .max_misses(config.cache.stale_entry_max_misses)
                .follow_symlinks(config.extract.follow_symlinks),
            );
        }

        Ok(domain)
    }

    pub fn with_extractors(
        mut self,
        common_artifacts: Option<EntryExtractor>,
        configuration_cache: Option<EntryExtractor>,
    ) -> Self {
        self.common_artifacts = common_artifacts;
        self.configuration_cache = configuration_cache;
        self
    }
}

pub fn metadata_file(home: &Path, extractor: &str) -> PathBuf {
    home.join(METADATA_DIR)
        .join(format!("{}-entries.json", extractor))
}

#[async_trait]
impl CacheDomain for GradleHomeDomain {
    fn name(&self) -> &str {
        GRADLE_HOME_DOMAIN
    }

    fn paths(&self) -> Vec<String> {
        let includes = self.include.iter().map(|p| rooted_pattern(&self.home, p));
        let excludes = self
            .exclude
            .iter()
            .map(|p| format!("!{}", rooted_pattern(&self.home, p)));
        includes.chain(excludes).collect()
    }

    fn output_exists(&self) -> bool {
        self.home.join("caches").is_dir()
    }

    async fn after_restore(&self, ctx: &CacheContext) -> GradleCacheResult<()> {
        if let Some(extractor) = &self.common_artifacts {
            extractor.restore(ctx).await?;
        }
        Ok(())
    }

    /// The configuration cache is only valid next to a complete restore
    async fn after_restore_all(&self, ctx: &CacheContext) -> GradleCacheResult<()> {
        if let Some(extractor) = &self.configuration_cache {
            if ctx.fully_restored().await {
                extractor.restore(ctx).await?;
            } else {
                info!("Gradle User Home was not fully restored: not restoring configuration cache");
                extractor
                    .purge(ctx, "Gradle User Home was not fully restored")
                    .await?;
            }
        }
        Ok(())
    }

    async fn before_save(&self, ctx: &CacheContext) -> GradleCacheResult<()> {
        delete_lock_files(&self.home, &HOME_LOCK_FILES).await?;

        if let Some(extractor) = &self.common_artifacts {
            extractor.save(ctx).await?;
        }
        if let Some(extractor) = &self.configuration_cache {
            extractor.save(ctx).await?;
        }
        Ok(())
    }
}

/// The project `.gradle` directory domain
pub struct ProjectDomain {
    dir: PathBuf,
}

impl ProjectDomain {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(".gradle"),
        }
    }

    pub fn from_config(config: &Config) -> GradleCacheResult<Self> {
        Ok(Self::new(ConfigManager::project_root(config)?))
    }
}

#[async_trait]
impl CacheDomain for ProjectDomain {
    fn name(&self) -> &str {
        PROJECT_DOMAIN
    }

    fn paths(&self) -> Vec<String> {
        vec![
            rooted_pattern(&self.dir, "*"),
            format!("!{}", rooted_pattern(&self.dir, CONFIGURATION_CACHE_DIR)),
        ]
    }

    fn output_exists(&self) -> bool {
        self.dir.is_dir()
    }

    async fn before_save(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
        delete_lock_files(&self.dir, &PROJECT_LOCK_FILES).await
    }
}

/// Remove Gradle lock files so the snapshot can be archived
async fn delete_lock_files(base: &Path, patterns: &[&str]) -> GradleCacheResult<()> {
    let patterns: Vec<String> = patterns.iter().map(|p| rooted_pattern(base, p)).collect();

    let removed = tokio::task::spawn_blocking(move || -> GradleCacheResult<usize> {
        let mut removed = 0;
        for pattern in &patterns {
            for path in glob::glob(pattern)?.flatten() {
                if !path.is_file() {
                    continue;
                }
                std::fs::remove_file(&path).map_err(|e| {
                    GradleCacheError::io(format!("removing lock file {}", path.display()), e)
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    })
    .await
    .map_err(|e| GradleCacheError::Internal(format!("lock file task failed: {e}")))??;

    debug!("Removed {} lock files under {}", removed, base.display());
    Ok(())
}
