//! Content hashing for content-sensitive cache keys
//!
//! Produces one digest over every regular file matched by a set of globs.
//! The digest depends on each file's path relative to the base directory and
//! on its bytes, never on the order the filesystem yields matches.

use crate::error::{GradleCacheError, GradleCacheResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

const READ_CHUNK: usize = 64 * 1024;

/// A regular file matched under a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Path as produced by the glob walk
    pub path: PathBuf,
    /// `/`-separated path relative to the base directory
    pub relative: String,
}

/// Hashes sets of files selected by glob patterns
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    follow_symlinks: bool,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links when matching (off by default)
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Digest every file matched by `patterns` under `base_dir`
    ///
    /// Returns `None` when nothing matched, which is distinct from any digest.
    pub async fn hash(
        &self,
        base_dir: &Path,
        patterns: &[String],
    ) -> GradleCacheResult<Option<String>> {
        let files = self.matching_files(base_dir, patterns).await?;
        hash_matched(&files).await
    }

    /// Enumerate regular files matched by `patterns`, sorted by relative path
    ///
    /// An empty pattern list selects everything under `base_dir`. Matches
    /// that resolve outside `base_dir` are discarded.
    pub async fn matching_files(
        &self,
        base_dir: &Path,
        patterns: &[String],
    ) -> GradleCacheResult<Vec<MatchedFile>> {
        let base_dir = base_dir.to_path_buf();
        let patterns = patterns.to_vec();
        let follow = self.follow_symlinks;

        tokio::task::spawn_blocking(move || collect_matches(&base_dir, &patterns, follow))
            .await
            .map_err(|e| GradleCacheError::Internal(format!("file matching task failed: {e}")))?
    }
}

fn collect_matches(
    base_dir: &Path,
    patterns: &[String],
    follow_symlinks: bool,
) -> GradleCacheResult<Vec<MatchedFile>> {
    let canonical_base = match base_dir.canonicalize() {
        Ok(base) => base,
        Err(_) => {
            debug!("Hash base {} does not exist", base_dir.display());
            return Ok(vec![]);
        }
    };

    let default_pattern = ["**/*".to_string()];
    let patterns: &[String] = if patterns.is_empty() {
        &default_pattern
    } else {
        patterns
    };

    // Keyed by relative path so overlapping patterns count a file once
    let mut matched = BTreeMap::new();

    for pattern in patterns {
        for entry in glob::glob(&rooted_pattern(base_dir, pattern))? {
            let Ok(path) = entry else {
                continue;
            };

            let metadata = if follow_symlinks {
                fs::metadata(&path)
            } else {
                fs::symlink_metadata(&path)
            };
            let Ok(metadata) = metadata else {
                continue;
            };
            if !metadata.file_type().is_file() {
                continue;
            }

            let Ok(resolved) = path.canonicalize() else {
                continue;
            };
            let Ok(resolved_relative) = resolved.strip_prefix(&canonical_base) else {
                debug!("Ignoring {} outside {}", path.display(), base_dir.display());
                continue;
            };

            // Name files by the matched path so each link is its own file
            let relative = match path.strip_prefix(base_dir) {
                Ok(lexical) if is_plain_relative(lexical) => relative_string(lexical),
                _ => relative_string(resolved_relative),
            };
            matched
                .entry(relative.clone())
                .or_insert(MatchedFile { path, relative });
        }
    }

    Ok(matched.into_values().collect())
}

/// Combined digest of already matched files; `None` when the list is empty
pub async fn hash_matched(files: &[MatchedFile]) -> GradleCacheResult<Option<String>> {
    if files.is_empty() {
        return Ok(None);
    }

    let mut sorted: Vec<&MatchedFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.relative.cmp(&b.relative));

    let mut combined = Sha256::new();
    for file in sorted {
        let digest = hash_file(&file.path).await?;
        combined.update(file.relative.as_bytes());
        combined.update([0u8]);
        combined.update(digest.as_bytes());
        combined.update([b'\n']);
    }

    Ok(Some(hex::encode(combined.finalize())))
}

/// Digest of the relative names only, for artifacts whose names identify content
pub fn hash_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut names: Vec<&str> = names.into_iter().collect();
    if names.is_empty() {
        return None;
    }
    names.sort_unstable();
    names.dedup();

    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([b'\n']);
    }
    Some(hex::encode(hasher.finalize()))
}

/// Streamed SHA256 of one file
async fn hash_file(path: &Path) -> GradleCacheResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| GradleCacheError::io(format!("opening {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| GradleCacheError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Join a relative glob onto a literal base directory
pub fn rooted_pattern(base_dir: &Path, pattern: &str) -> String {
    let base = glob::Pattern::escape(&base_dir.to_string_lossy());
    format!("{}/{}", base.trim_end_matches('/'), pattern)
}

fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, std::path::Component::Normal(_)))
}

fn relative_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
