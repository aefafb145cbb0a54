//! Restore-to-save phase handoff
//!
//! The restore and save steps of a job run in separate processes. Everything
//! the save step needs from the restore step travels in one `PhaseState`
//! written to a JSON file at the end of restore and read back at save.

use crate::cache::report::CacheReport;
use crate::error::{GradleCacheError, GradleCacheResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Marks that the restore step already ran in this job
pub const SETUP_MARKER: &str = "GRADLE_CACHE_SETUP_COMPLETE";

/// What the restore step learned about one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainState {
    /// Key computed at restore; the save step saves under it
    pub cache_key: String,
    /// Key of the entry actually restored, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_key: Option<String>,
}

impl DomainState {
    pub fn new(cache_key: impl Into<String>, matched_key: Option<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            matched_key,
        }
    }

    /// Restored entry was the exact key, not a fallback
    pub fn is_exact_hit(&self) -> bool {
        self.matched_key.as_deref() == Some(self.cache_key.as_str())
    }
}

/// State carried from the restore step to the save step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseState {
    #[serde(default)]
    pub domains: BTreeMap<String, DomainState>,
    /// `CacheReport::stringify` output
    #[serde(default)]
    report: String,
}

impl PhaseState {
    pub fn new(report: &CacheReport) -> GradleCacheResult<Self> {
        let mut state = Self::default();
        state.set_report(report)?;
        Ok(state)
    }

    pub fn report(&self) -> GradleCacheResult<CacheReport> {
        CacheReport::rehydrate(&self.report)
    }

    pub fn set_report(&mut self, report: &CacheReport) -> GradleCacheResult<()> {
        self.report = report.stringify()?;
        Ok(())
    }

    pub fn domain(&self, name: &str) -> Option<&DomainState> {
        self.domains.get(name)
    }

    /// Load state; `None` when the restore step never wrote any
    pub async fn load(path: &Path) -> GradleCacheResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            GradleCacheError::io(format!("reading state file {}", path.display()), e)
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| GradleCacheError::StateCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    pub async fn save(&self, path: &Path) -> GradleCacheResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GradleCacheError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| GradleCacheError::StatePersist(format!("{}: {}", path.display(), e)))?;

        debug!("Wrote cache state to {}", path.display());
        Ok(())
    }
}

/// Whether the restore step already ran earlier in this job
pub fn already_set_up() -> bool {
    std::env::var(SETUP_MARKER).is_ok_and(|v| v == "true")
}

/// Record that the restore step ran, for this process and later job steps
///
/// Later steps see the marker through the `$GITHUB_ENV` file when present.
pub async fn mark_set_up() -> GradleCacheResult<()> {
    std::env::set_var(SETUP_MARKER, "true");

    let Some(env_file) = std::env::var_os("GITHUB_ENV").filter(|v| !v.is_empty()) else {
        return Ok(());
    };

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&env_file)
        .await
        .map_err(|e| GradleCacheError::io("opening GITHUB_ENV", e))?;
    file.write_all(format!("{}=true\n", SETUP_MARKER).as_bytes())
        .await
        .map_err(|e| GradleCacheError::io("writing GITHUB_ENV", e))?;
    file.flush()
        .await
        .map_err(|e| GradleCacheError::io("flushing GITHUB_ENV", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn exact_hit_detection() {
        assert!(DomainState::new("k", Some("k".to_string())).is_exact_hit());
        assert!(!DomainState::new("k", Some("k-old".to_string())).is_exact_hit());
        assert!(!DomainState::new("k", None).is_exact_hit());
    }

    #[tokio::test]
    async fn state_roundtrip_carries_report() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");

        let mut report = CacheReport::new();
        report.entry("gradle").mark_requested("k", vec![]);
        let mut state = PhaseState::new(&report).unwrap();
        state
            .domains
            .insert("gradle".to_string(), DomainState::new("k", None));
        state.save(&path).await.unwrap();

        let loaded = PhaseState::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.domain("gradle"), Some(&DomainState::new("k", None)));

        let mut report = loaded.report().unwrap();
        report.entry("gradle").mark_saved("k", 1);
        assert_eq!(report.get("gradle").unwrap().saved_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn missing_state_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(PhaseState::load(&temp.path().join("none.json"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn corrupt_state_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let err = PhaseState::load(&path).await.unwrap_err();
        assert!(matches!(err, GradleCacheError::StateCorrupt { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn setup_marker_is_exported() {
        let temp = TempDir::new().unwrap();
        let env_file = temp.path().join("github_env");
        std::env::set_var("GITHUB_ENV", &env_file);
        std::env::remove_var(SETUP_MARKER);

        assert!(!already_set_up());
        mark_set_up().await.unwrap();
        assert!(already_set_up());

        let content = std::fs::read_to_string(&env_file).unwrap();
        assert_eq!(content, "GRADLE_CACHE_SETUP_COMPLETE=true\n");

        std::env::remove_var("GITHUB_ENV");
        std::env::remove_var(SETUP_MARKER);
    }
}
