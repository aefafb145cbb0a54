//! Cache provider abstraction
//!
//! The provider is the remote, immutable key-value blob store. The
//! orchestration layer only shapes keys and interprets outcomes; all actual
//! storage happens behind this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Longest key accepted by the hosted cache service
pub const MAX_KEY_LENGTH: usize = 512;

/// An entry as stored by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Key the entry is stored under
    pub key: String,
    /// Archive size in bytes
    pub size: u64,
}

/// Errors raised by a cache provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Malformed key or path set; a programming error, never transient
    #[error("{0}")]
    Validation(String),

    /// The key was already saved, typically by a concurrent job
    #[error("Unable to reserve cache with key {0}, another job may be creating this cache")]
    Reserved(String),

    /// None of the paths matched a file; nothing to save
    #[error("Path Validation Error: Path(s) specified for caching do not exist, hence no cache is being saved")]
    NoFiles,

    /// Network, quota or service trouble
    #[error("cache service unavailable: {0}")]
    Unavailable(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Remote blob store holding cache entries
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Restore `paths` from the first key that matches
    ///
    /// `primary_key` must match exactly; each of `restore_keys` is tried in
    /// order as a prefix. Returns `None` on a miss.
    async fn restore_cache(
        &self,
        paths: &[String],
        primary_key: &str,
        restore_keys: &[String],
    ) -> ProviderResult<Option<StoredEntry>>;

    /// Save `paths` under `key`; entries are immutable once written
    async fn save_cache(&self, paths: &[String], key: &str) -> ProviderResult<StoredEntry>;

    /// Human-readable provider name for logs
    fn provider_name(&self) -> &'static str;
}

/// Reject keys the hosted service would refuse
pub fn validate_key(key: &str) -> ProviderResult<()> {
    if key.is_empty() {
        return Err(ProviderError::Validation("Cache key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ProviderError::Validation(format!(
            "Key Validation Error: {} cannot be larger than {} characters",
            key, MAX_KEY_LENGTH
        )));
    }
    if key.contains(',') {
        return Err(ProviderError::Validation(format!(
            "Key Validation Error: {} cannot contain commas",
            key
        )));
    }
    Ok(())
}

/// Reject an empty path set
pub fn validate_paths(paths: &[String]) -> ProviderResult<()> {
    if paths.iter().all(|p| p.trim().is_empty()) {
        return Err(ProviderError::Validation(
            "Path Validation Error: At least one directory or file path is required".to_string(),
        ));
    }
    Ok(())
}
