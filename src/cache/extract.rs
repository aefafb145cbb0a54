//! Extracted cache entries
//!
//! Large, shared artifacts inside the Gradle User Home (dependency jars,
//! wrapper distributions, toolchains) are pulled out of the home snapshot
//! and cached under their own content- or name-based keys. Jobs with
//! different home keys then share one copy of each artifact.
//!
//! The extractor keeps a metadata file listing what it saved so the next
//! restore knows which entries to fetch:
//!
//! ```json
//! { "entries": [ { "artifactType": "dependencies", "pattern": "caches/...", "cacheKey": "..." } ] }
//! ```

use crate::cache::hash::{hash_matched, hash_names, rooted_pattern, ContentHasher, MatchedFile};
use crate::cache::orchestrator::{CacheContext, SaveOutcome};
use crate::config::ExtractedEntryDefinition;
use crate::error::{GradleCacheError, GradleCacheResult};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// One persisted extracted entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntry {
    pub artifact_type: String,
    /// Glob relative to the extractor's base directory
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Consecutive saves that found nothing for this entry
    #[serde(default, skip_serializing_if = "is_zero")]
    pub misses: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl ExtractedEntry {
    fn new(artifact_type: &str, pattern: &str, cache_key: Option<String>) -> Self {
        Self {
            artifact_type: artifact_type.to_string(),
            pattern: pattern.to_string(),
            cache_key,
            misses: 0,
        }
    }

    /// Report entry name, stable between restore and save
    pub fn report_name(&self) -> String {
        format!("{}: {}", self.artifact_type, self.pattern)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ExtractedMetadata {
    #[serde(default)]
    entries: Vec<ExtractedEntry>,
}

/// Splits matching sub-artifacts out of a cache domain
#[derive(Debug, Clone)]
pub struct EntryExtractor {
    base_dir: PathBuf,
    metadata_file: PathBuf,
    definitions: Vec<ExtractedEntryDefinition>,
    skip_restore: Vec<String>,
    max_misses: u32,
    hasher: ContentHasher,
}

impl EntryExtractor {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        metadata_file: impl Into<PathBuf>,
        definitions: Vec<ExtractedEntryDefinition>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            metadata_file: metadata_file.into(),
            definitions,
            skip_restore: vec![],
            max_misses: 1,
            hasher: ContentHasher::new(),
        }
    }

    /// Artifact types that are never restored
    pub fn skip_restore(mut self, artifact_types: Vec<String>) -> Self {
        self.skip_restore = artifact_types;
        self
    }

    /// Saves without a match before an entry is forgotten
    pub fn max_misses(mut self, max_misses: u32) -> Self {
        self.max_misses = max_misses.max(1);
        self
    }

    /// Follow symbolic links when matching entry files
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.hasher = self.hasher.follow_symlinks(follow);
        self
    }

    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Restore every entry recorded by the previous save
    pub async fn restore(&self, ctx: &CacheContext) -> GradleCacheResult<()> {
        let previous = self.load_metadata().await?;

        let entries = if ctx.options().debug {
            let mut restored = Vec::with_capacity(previous.entries.len());
            for entry in previous.entries {
                restored.push(self.restore_one(ctx, entry).await?);
            }
            restored
        } else {
            join_all(
                previous
                    .entries
                    .into_iter()
                    .map(|entry| self.restore_one(ctx, entry)),
            )
            .await
            .into_iter()
            .collect::<GradleCacheResult<Vec<_>>>()?
        };

        self.save_metadata(&ExtractedMetadata { entries }).await
    }

    async fn restore_one(
        &self,
        ctx: &CacheContext,
        mut entry: ExtractedEntry,
    ) -> GradleCacheResult<ExtractedEntry> {
        let Some(key) = entry.cache_key.take() else {
            return Ok(entry);
        };

        if self.skip_restore.contains(&entry.artifact_type) {
            info!("Not restoring extracted {} entries", entry.artifact_type);
            return Ok(entry);
        }

        let paths = [rooted_pattern(&self.base_dir, &entry.pattern)];
        let hit = ctx
            .restore_entry(&entry.report_name(), &paths, &key, &[])
            .await?;
        entry.cache_key = hit.map(|h| h.key);
        Ok(entry)
    }

    /// Forget the recorded entries and delete whatever is on disk for them
    pub async fn purge(&self, ctx: &CacheContext, reason: &str) -> GradleCacheResult<()> {
        let mut metadata = self.load_metadata().await?;

        for entry in &mut metadata.entries {
            let name = entry.report_name();
            info!("Not restoring {}: {}", name, reason);
            ctx.report().lock().await.entry(&name).mark_not_restored(reason);

            entry.cache_key = None;
            for path in self.glob(&entry.pattern).await? {
                remove_path(&path).await?;
            }
        }

        self.save_metadata(&metadata).await
    }

    /// Save each definition's matches separately, then remove them from the base
    pub async fn save(&self, ctx: &CacheContext) -> GradleCacheResult<()> {
        let previous = self.load_metadata().await?;
        let mut entries = vec![];

        for definition in &self.definitions {
            let saved = if definition.bundle {
                self.save_bundle(ctx, definition, &previous).await?
            } else {
                self.save_each(ctx, definition, &previous).await?
            };

            if saved.is_empty() {
                debug!("No files found to extract for {}", definition.pattern);
            }

            let stale: Vec<ExtractedEntry> = {
                let seen: HashSet<&str> = saved.iter().map(|e| e.pattern.as_str()).collect();
                let stale = previous
                    .entries
                    .iter()
                    .filter(|e| e.artifact_type == definition.artifact_type)
                    .filter(|e| !seen.contains(e.pattern.as_str()))
                    .filter_map(|e| self.carry_forward(e))
                    .collect();
                stale
            };

            entries.extend(saved);
            entries.extend(stale);
        }

        self.save_metadata(&ExtractedMetadata { entries }).await
    }

    /// Keep a missing entry until it has missed `max_misses` saves
    fn carry_forward(&self, entry: &ExtractedEntry) -> Option<ExtractedEntry> {
        let misses = entry.misses + 1;
        if misses >= self.max_misses {
            debug!("Dropping stale extracted entry {}", entry.report_name());
            return None;
        }
        Some(ExtractedEntry {
            misses,
            ..entry.clone()
        })
    }

    async fn save_bundle(
        &self,
        ctx: &CacheContext,
        definition: &ExtractedEntryDefinition,
        previous: &ExtractedMetadata,
    ) -> GradleCacheResult<Vec<ExtractedEntry>> {
        let files = self
            .hasher
            .matching_files(&self.base_dir, std::slice::from_ref(&definition.pattern))
            .await?;

        let digest = if definition.unique_file_names {
            hash_names(files.iter().map(|f| f.relative.as_str()))
        } else {
            hash_matched(&files).await?
        };
        let Some(digest) = digest else {
            return Ok(vec![]);
        };

        let paths: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();
        let entry = self
            .save_entry(ctx, definition, &definition.pattern, &digest, &paths, previous)
            .await?;
        Ok(vec![entry])
    }

    async fn save_each(
        &self,
        ctx: &CacheContext,
        definition: &ExtractedEntryDefinition,
        previous: &ExtractedMetadata,
    ) -> GradleCacheResult<Vec<ExtractedEntry>> {
        let mut entries = vec![];

        for path in self.glob(&definition.pattern).await? {
            let Ok(relative) = path.strip_prefix(&self.base_dir) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            let pattern = glob::Pattern::escape(&relative);

            let digest = if definition.unique_file_names {
                hash_names([relative.as_str()])
            } else {
                self.content_digest(&path, &relative, &pattern).await?
            };
            let Some(digest) = digest else {
                continue;
            };

            let entry = self
                .save_entry(ctx, definition, &pattern, &digest, &[path], previous)
                .await?;
            entries.push(entry);
        }

        Ok(entries)
    }

    async fn content_digest(
        &self,
        path: &Path,
        relative: &str,
        pattern: &str,
    ) -> GradleCacheResult<Option<String>> {
        if path.is_dir() {
            return self
                .hasher
                .hash(&self.base_dir, &[format!("{}/**/*", pattern)])
                .await;
        }
        hash_matched(&[MatchedFile {
            path: path.to_path_buf(),
            relative: relative.to_string(),
        }])
        .await
    }

    async fn save_entry(
        &self,
        ctx: &CacheContext,
        definition: &ExtractedEntryDefinition,
        pattern: &str,
        digest: &str,
        extracted: &[PathBuf],
        previous: &ExtractedMetadata,
    ) -> GradleCacheResult<ExtractedEntry> {
        let key = ctx.keys().extracted_key(&definition.artifact_type, digest);
        let mut entry = ExtractedEntry::new(&definition.artifact_type, pattern, Some(key.clone()));
        let name = entry.report_name();

        let unchanged = previous.entries.iter().any(|e| {
            e.artifact_type == definition.artifact_type
                && e.pattern == pattern
                && e.cache_key.as_deref() == Some(key.as_str())
        });

        let stored = if unchanged {
            info!("No change to previously restored {}, not saving", name);
            ctx.mark_not_saved(&name, "contents unchanged").await;
            true
        } else {
            let paths = [rooted_pattern(&self.base_dir, pattern)];
            match ctx.save_entry(&name, &paths, &key).await? {
                SaveOutcome::Saved(_) | SaveOutcome::AlreadyExists => true,
                SaveOutcome::Skipped => false,
            }
        };

        if stored {
            for path in extracted {
                remove_path(path).await?;
            }
        } else {
            // Left in place so the domain snapshot still carries it
            entry.cache_key = None;
        }
        Ok(entry)
    }

    /// Files and directories matching `pattern` under the base, sorted
    async fn glob(&self, pattern: &str) -> GradleCacheResult<Vec<PathBuf>> {
        let rooted = rooted_pattern(&self.base_dir, pattern);
        tokio::task::spawn_blocking(move || -> GradleCacheResult<Vec<PathBuf>> {
            let mut paths: Vec<PathBuf> = glob::glob(&rooted)?.flatten().collect();
            paths.sort();
            Ok(paths)
        })
        .await
        .map_err(|e| GradleCacheError::Internal(format!("glob task failed: {e}")))?
    }

    async fn load_metadata(&self) -> GradleCacheResult<ExtractedMetadata> {
        let content = match fs::read_to_string(&self.metadata_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ExtractedMetadata::default())
            }
            Err(e) => {
                return Err(GradleCacheError::io(
                    format!("reading {}", self.metadata_file.display()),
                    e,
                ))
            }
        };

        match serde_json::from_str(&content) {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                warn!(
                    "Ignoring unreadable extracted entry metadata {}: {}",
                    self.metadata_file.display(),
                    e
                );
                Ok(ExtractedMetadata::default())
            }
        }
    }

    async fn save_metadata(&self, metadata: &ExtractedMetadata) -> GradleCacheResult<()> {
        if let Some(parent) = self.metadata_file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GradleCacheError::io(format!("creating {}", parent.display()), e))?;
        }
        let content = serde_json::to_string_pretty(metadata)?;
        fs::write(&self.metadata_file, content)
            .await
            .map_err(|e| {
                GradleCacheError::io(format!("writing {}", self.metadata_file.display()), e)
            })
    }
}

async fn remove_path(path: &Path) -> GradleCacheResult<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GradleCacheError::io(format!("removing {}", path.display()), e)),
    }
}
