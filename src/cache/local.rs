//! Directory-backed cache provider
//!
//! Stores each entry as a directory under the store root:
//!
//! ```text
//! <root>/<entry-id>/manifest.json
//! <root>/<entry-id>/files/<path without root>
//! ```
//!
//! Entries are immutable and scoped to a branch. Restores see the current
//! branch first, then the default branch, mirroring hosted CI caches.

use crate::cache::key::hash_strings;
use crate::cache::provider::{
    validate_key, validate_paths, CacheProvider, ProviderError, ProviderResult, StoredEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const MANIFEST: &str = "manifest.json";
const FILES: &str = "files";

/// Metadata stored alongside every entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryManifest {
    key: String,
    scope: Option<String>,
    /// Digest of the path set; entries only restore into the same paths
    version: String,
    created_at: DateTime<Utc>,
    size: u64,
    files: Vec<PathBuf>,
}

/// Cache provider storing entries in a local directory
#[derive(Debug, Clone)]
pub struct LocalCacheProvider {
    root: PathBuf,
    scope: Option<String>,
    default_scope: Option<String>,
}

impl LocalCacheProvider {
    /// Create a provider rooted at `root`, unscoped
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope: None,
            default_scope: None,
        }
    }

    /// Save into `scope`; restore from `scope`, then `default_scope`
    pub fn with_scope(mut self, scope: Option<String>, default_scope: Option<String>) -> Self {
        self.scope = scope;
        self.default_scope = default_scope;
        self
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        let scope = self.scope.as_deref().unwrap_or("");
        self.root.join(&hash_strings(&[scope, key])[..32])
    }

    fn visible_scopes(&self) -> Vec<Option<String>> {
        let mut scopes = vec![self.scope.clone()];
        if self.default_scope.is_some() && self.default_scope != self.scope {
            scopes.push(self.default_scope.clone());
        }
        scopes
    }

    fn save_blocking(&self, paths: &[String], key: &str) -> ProviderResult<StoredEntry> {
        let entry_dir = self.entry_dir(key);
        if entry_dir.join(MANIFEST).exists() {
            return Err(ProviderError::Reserved(key.to_string()));
        }

        let files = resolve_paths(paths)?;
        if files.is_empty() {
            return Err(ProviderError::NoFiles);
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| ProviderError::io(format!("creating {}", self.root.display()), e))?;
        let staging = tempfile::Builder::new()
            .prefix(".saving-")
            .tempdir_in(&self.root)
            .map_err(|e| ProviderError::io("creating staging directory", e))?;

        let mut size = 0;
        for file in &files {
            let target = staging.path().join(FILES).join(stored_path(file));
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ProviderError::io(format!("creating {}", parent.display()), e))?;
            }
            size += fs::copy(file, &target)
                .map_err(|e| ProviderError::io(format!("archiving {}", file.display()), e))?;
        }

        let manifest = EntryManifest {
            key: key.to_string(),
            scope: self.scope.clone(),
            version: path_version(paths),
            created_at: Utc::now(),
            size,
            files,
        };
        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| ProviderError::Unavailable(format!("encoding manifest: {e}")))?;
        fs::write(staging.path().join(MANIFEST), content)
            .map_err(|e| ProviderError::io("writing manifest", e))?;

        if let Err(e) = fs::rename(staging.path(), &entry_dir) {
            if entry_dir.exists() {
                return Err(ProviderError::Reserved(key.to_string()));
            }
            return Err(ProviderError::io(format!("committing entry {}", key), e));
        }

        debug!("Stored {} ({} bytes) at {}", key, size, entry_dir.display());
        Ok(StoredEntry {
            key: key.to_string(),
            size,
        })
    }

    fn restore_blocking(
        &self,
        paths: &[String],
        primary_key: &str,
        restore_keys: &[String],
    ) -> ProviderResult<Option<StoredEntry>> {
        let version = path_version(paths);
        let candidates: Vec<(PathBuf, EntryManifest)> = self
            .load_manifests()?
            .into_iter()
            .filter(|(_, m)| m.version == version)
            .collect();

        let Some((dir, manifest)) = select_entry(
            &candidates,
            &self.visible_scopes(),
            primary_key,
            restore_keys,
        ) else {
            return Ok(None);
        };

        for file in &manifest.files {
            let source = dir.join(FILES).join(stored_path(file));
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ProviderError::io(format!("creating {}", parent.display()), e))?;
            }
            fs::copy(&source, file)
                .map_err(|e| ProviderError::io(format!("restoring {}", file.display()), e))?;
        }

        Ok(Some(StoredEntry {
            key: manifest.key.clone(),
            size: manifest.size,
        }))
    }

    fn load_manifests(&self) -> ProviderResult<Vec<(PathBuf, EntryManifest)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(ProviderError::io(
                    format!("reading store {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut manifests = vec![];
        for entry in entries.flatten() {
            let dir = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(content) = fs::read_to_string(dir.join(MANIFEST)) else {
                continue;
            };
            match serde_json::from_str::<EntryManifest>(&content) {
                Ok(manifest) => manifests.push((dir, manifest)),
                Err(e) => debug!("Ignoring unreadable manifest in {}: {}", dir.display(), e),
            }
        }
        Ok(manifests)
    }
}

#[async_trait]
impl CacheProvider for LocalCacheProvider {
    async fn restore_cache(
        &self,
        paths: &[String],
        primary_key: &str,
        restore_keys: &[String],
    ) -> ProviderResult<Option<StoredEntry>> {
        validate_key(primary_key)?;
        for key in restore_keys {
            validate_key(key)?;
        }
        validate_paths(paths)?;

        let provider = self.clone();
        let paths = paths.to_vec();
        let primary_key = primary_key.to_string();
        let restore_keys = restore_keys.to_vec();
        tokio::task::spawn_blocking(move || {
            provider.restore_blocking(&paths, &primary_key, &restore_keys)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("restore task failed: {e}")))?
    }

    async fn save_cache(&self, paths: &[String], key: &str) -> ProviderResult<StoredEntry> {
        validate_key(key)?;
        validate_paths(paths)?;

        let provider = self.clone();
        let paths = paths.to_vec();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || provider.save_blocking(&paths, &key))
            .await
            .map_err(|e| ProviderError::Unavailable(format!("save task failed: {e}")))?
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

/// Scope by scope: exact primary key, then restore keys as prefixes (newest wins)
fn select_entry<'a>(
    candidates: &'a [(PathBuf, EntryManifest)],
    scopes: &[Option<String>],
    primary_key: &str,
    restore_keys: &[String],
) -> Option<&'a (PathBuf, EntryManifest)> {
    for scope in scopes {
        let in_scope = || candidates.iter().filter(move |(_, m)| &m.scope == scope);

        if let Some(exact) = in_scope().find(|(_, m)| m.key == primary_key) {
            return Some(exact);
        }
        for prefix in restore_keys {
            let newest = in_scope()
                .filter(|(_, m)| m.key.starts_with(prefix.as_str()))
                .max_by_key(|(_, m)| m.created_at);
            if newest.is_some() {
                return newest;
            }
        }
    }
    None
}

/// Expand include globs (directories walked) minus `!`-prefixed excludes
fn resolve_paths(paths: &[String]) -> ProviderResult<Vec<PathBuf>> {
    let (excludes, includes): (Vec<&String>, Vec<&String>) =
        paths.iter().partition(|p| p.starts_with('!'));

    let mut excluded = vec![];
    for pattern in excludes {
        excluded.extend(expand(&pattern[1..])?);
    }

    let mut files = vec![];
    for pattern in includes {
        for root in expand(pattern)? {
            for entry in WalkDir::new(&root).follow_links(false).into_iter().flatten() {
                let path = entry.path();
                if !entry.file_type().is_file() {
                    continue;
                }
                if excluded.iter().any(|ex| path.starts_with(ex)) {
                    continue;
                }
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn expand(pattern: &str) -> ProviderResult<Vec<PathBuf>> {
    let absolute = absolute_pattern(pattern);
    let matches = glob::glob(&absolute).map_err(|e| {
        ProviderError::Validation(format!("Path Validation Error: {}: {}", pattern, e))
    })?;
    Ok(matches.flatten().collect())
}

fn absolute_pattern(pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    match std::env::current_dir() {
        Ok(cwd) => format!(
            "{}/{}",
            glob::Pattern::escape(&cwd.to_string_lossy()),
            pattern
        ),
        Err(_) => pattern.to_string(),
    }
}

fn path_version(paths: &[String]) -> String {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    hash_strings(&refs)
}

/// Path with root and prefix components removed, for storing under `files/`
fn stored_path(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
