//! Cache entry reporting
//!
//! Every cache slot touched during a run gets one `CacheEntryReport`, owned
//! by the run's `CacheReport`. The report crosses the restore/save process
//! boundary as a JSON string and is finally rendered for humans.

use crate::error::GradleCacheResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Lifecycle record of one named cache slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryReport {
    pub entry_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_restore_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_restored: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_key: Option<String>,

    /// `Some(0)` means the entry already existed and nothing was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_saved: Option<String>,
}

impl CacheEntryReport {
    pub fn new(entry_name: impl Into<String>) -> Self {
        Self {
            entry_name: entry_name.into(),
            ..Self::default()
        }
    }

    pub fn mark_requested(
        &mut self,
        key: impl Into<String>,
        restore_keys: Vec<String>,
    ) -> &mut Self {
        self.requested_key = Some(key.into());
        self.requested_restore_keys = restore_keys;
        self
    }

    pub fn mark_restored(&mut self, key: impl Into<String>, size: u64) -> &mut Self {
        self.restored_key = Some(key.into());
        self.restored_size = Some(size);
        self
    }

    pub fn mark_not_restored(&mut self, reason: impl Into<String>) -> &mut Self {
        self.not_restored = Some(reason.into());
        self
    }

    pub fn mark_saved(&mut self, key: impl Into<String>, size: u64) -> &mut Self {
        self.saved_key = Some(key.into());
        self.saved_size = Some(size);
        self
    }

    /// Another job saved this key first
    pub fn mark_already_exists(&mut self, key: impl Into<String>) -> &mut Self {
        self.saved_key = Some(key.into());
        self.saved_size = Some(0);
        self
    }

    pub fn mark_not_saved(&mut self, reason: impl Into<String>) -> &mut Self {
        self.not_saved = Some(reason.into());
        self
    }

    pub fn was_requested_but_not_restored(&self) -> bool {
        self.requested_key.is_some() && self.restored_key.is_none()
    }

    pub fn already_existed(&self) -> bool {
        self.saved_key.is_some() && self.saved_size == Some(0)
    }

    fn was_written(&self) -> bool {
        self.saved_key.is_some() && !self.already_existed()
    }
}

/// Whole-run record of every cache slot plus run-level flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    #[serde(default)]
    pub cache_entries: Vec<CacheEntryReport>,

    #[serde(default)]
    pub cache_read_only: bool,

    #[serde(default)]
    pub cache_write_only: bool,

    #[serde(default)]
    pub cache_disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_disabled_reason: Option<String>,
}

impl CacheReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for `name`, creating it on first reference
    pub fn entry(&mut self, name: &str) -> &mut CacheEntryReport {
        let index = match self.cache_entries.iter().position(|e| e.entry_name == name) {
            Some(index) => index,
            None => {
                self.cache_entries.push(CacheEntryReport::new(name));
                self.cache_entries.len() - 1
            }
        };
        &mut self.cache_entries[index]
    }

    pub fn get(&self, name: &str) -> Option<&CacheEntryReport> {
        self.cache_entries.iter().find(|e| e.entry_name == name)
    }

    pub fn set_disabled(&mut self, reason: Option<String>) {
        self.cache_disabled = true;
        self.cache_disabled_reason = reason;
    }

    /// True unless some entry was requested and got no match at all
    pub fn fully_restored(&self) -> bool {
        !self
            .cache_entries
            .iter()
            .any(CacheEntryReport::was_requested_but_not_restored)
    }

    /// Serialize for handoff to a later process step
    pub fn stringify(&self) -> GradleCacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild a report from `stringify` output
    ///
    /// An empty string yields an empty report. Duplicate entry names keep the
    /// first occurrence so names stay unique.
    pub fn rehydrate(serialized: &str) -> GradleCacheResult<Self> {
        if serialized.trim().is_empty() {
            return Ok(Self::new());
        }

        let mut report: CacheReport = serde_json::from_str(serialized)?;
        let mut seen = std::collections::HashSet::new();
        report
            .cache_entries
            .retain(|entry| seen.insert(entry.entry_name.clone()));
        Ok(report)
    }

    /// Multi-line human report: summary table then per-entry details
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.cache_disabled {
            let _ = writeln!(
                out,
                "Caching was disabled: {}",
                self.cache_disabled_reason.as_deref().unwrap_or("by configuration")
            );
            return out;
        }
        if self.cache_read_only {
            let _ = writeln!(out, "Cache was read-only: no entries were saved.");
        }
        if self.cache_write_only {
            let _ = writeln!(out, "Cache was write-only: no entries were restored.");
        }

        let requested = self
            .cache_entries
            .iter()
            .filter(|e| e.requested_key.is_some())
            .count();
        let restored: Vec<&CacheEntryReport> = self
            .cache_entries
            .iter()
            .filter(|e| e.restored_key.is_some())
            .collect();
        let saved: Vec<&CacheEntryReport> = self
            .cache_entries
            .iter()
            .filter(|e| e.was_written())
            .collect();
        let existing = self
            .cache_entries
            .iter()
            .filter(|e| e.already_existed())
            .count();

        let restored_size: u64 = restored.iter().filter_map(|e| e.restored_size).sum();
        let saved_size: u64 = saved.iter().filter_map(|e| e.saved_size).sum();

        let _ = writeln!(out, "{:<12} {:>8} {:>12}", "", "ENTRIES", "SIZE");
        let _ = writeln!(out, "{}", "-".repeat(34));
        let _ = writeln!(out, "{:<12} {:>8} {:>12}", "Requested", requested, "");
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>12}",
            "Restored",
            restored.len(),
            format_bytes(restored_size)
        );
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>12}",
            "Saved",
            saved.len(),
            format_bytes(saved_size)
        );
        let _ = writeln!(out, "{:<12} {:>8} {:>12}", "Existing", existing, "");

        for entry in &self.cache_entries {
            let _ = writeln!(out);
            render_entry(&mut out, entry);
        }

        out
    }
}

fn render_entry(out: &mut String, entry: &CacheEntryReport) {
    let _ = writeln!(out, "Entry: {}", entry.entry_name);

    match entry.requested_key {
        Some(ref key) => {
            let _ = writeln!(out, "    Requested Key : {}", key);
            let _ = writeln!(
                out,
                "    Restore Keys  : {}",
                entry.requested_restore_keys.join(", ")
            );
        }
        None => {
            let _ = writeln!(out, "    Requested Key : (none)");
        }
    }

    match (&entry.restored_key, &entry.not_restored) {
        (Some(key), _) => {
            let size = format_bytes(entry.restored_size.unwrap_or(0));
            let _ = writeln!(out, "    Restored Key  : {}", key);
            let _ = writeln!(out, "              Size: {}", size);
        }
        (None, Some(reason)) => {
            let _ = writeln!(out, "    Restored Key  : (not restored: {})", reason);
        }
        (None, None) => {
            let _ = writeln!(out, "    Restored Key  : (not restored)");
        }
    }

    match (&entry.saved_key, &entry.not_saved) {
        (Some(key), _) if entry.already_existed() => {
            let _ = writeln!(out, "    Saved Key     : {}", key);
            let _ = writeln!(out, "              (entry already exists)");
        }
        (Some(key), _) => {
            let size = format_bytes(entry.saved_size.unwrap_or(0));
            let _ = writeln!(out, "    Saved Key     : {}", key);
            let _ = writeln!(out, "              Size: {}", size);
        }
        (None, Some(reason)) => {
            let _ = writeln!(out, "    Saved Key     : (not saved: {})", reason);
        }
        (None, None) => {
            let _ = writeln!(out, "    Saved Key     : (not saved)");
        }
    }
}
