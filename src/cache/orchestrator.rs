//! Restore/save protocol for cache domains
//!
//! One `CacheOrchestrator` drives one domain through a job run:
//!
//! | Phase | Skipped when | Otherwise |
//! |-------|--------------|-----------|
//! | restore | output already present | derive key, restore with fallbacks, run `after_restore` |
//! | restore (joined) | domain not restored | run `after_restore_all` once every domain finished |
//! | save | output missing, pre-existing, exact hit, read-only | run `before_save`, save under the restore-phase key |
//!
//! Provider validation failures are fatal, including those raised inside
//! hooks. Reservation conflicts are recorded as "already exists". Every other
//! provider or hook failure is logged and treated as a miss, so caching
//! trouble never fails the build.

use crate::cache::handoff::{DomainState, PhaseState};
use crate::cache::key::KeyDerivation;
use crate::cache::provider::{CacheProvider, ProviderError, StoredEntry};
use crate::cache::report::CacheReport;
use crate::error::{GradleCacheError, GradleCacheResult};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Run-level switches consulted by the protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    pub read_only: bool,
    pub write_only: bool,
    /// Run concurrent sub-restores one at a time for readable logs
    pub debug: bool,
}

/// Everything a domain and its hooks need during one phase
pub struct CacheContext {
    provider: Arc<dyn CacheProvider>,
    keys: KeyDerivation,
    report: Mutex<CacheReport>,
    options: CacheOptions,
}

/// Outcome of a save attempt that did not fail fatally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(StoredEntry),
    AlreadyExists,
    Skipped,
}

impl CacheContext {
    pub fn new(
        provider: Arc<dyn CacheProvider>,
        keys: KeyDerivation,
        report: CacheReport,
        options: CacheOptions,
    ) -> Self {
        Self {
            provider,
            keys,
            report: Mutex::new(report),
            options,
        }
    }

    pub fn keys(&self) -> &KeyDerivation {
        &self.keys
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn report(&self) -> &Mutex<CacheReport> {
        &self.report
    }

    pub fn into_report(self) -> CacheReport {
        self.report.into_inner()
    }

    pub async fn fully_restored(&self) -> bool {
        self.report.lock().await.fully_restored()
    }

    /// Restore one report entry, applying the provider error policy
    pub async fn restore_entry(
        &self,
        entry_name: &str,
        paths: &[String],
        key: &str,
        restore_keys: &[String],
    ) -> GradleCacheResult<Option<StoredEntry>> {
        self.report
            .lock()
            .await
            .entry(entry_name)
            .mark_requested(key, restore_keys.to_vec());

        match self.provider.restore_cache(paths, key, restore_keys).await {
            Ok(Some(hit)) => {
                info!("Restored {} from cache key {}", entry_name, hit.key);
                self.report
                    .lock()
                    .await
                    .entry(entry_name)
                    .mark_restored(&hit.key, hit.size);
                Ok(Some(hit))
            }
            Ok(None) => {
                debug!("No cache entry found for {} ({})", entry_name, key);
                Ok(None)
            }
            Err(ProviderError::Validation(reason)) => Err(GradleCacheError::CacheValidation(reason)),
            Err(e) => {
                warn!("Failed to restore {}: {}", key, e);
                self.report
                    .lock()
                    .await
                    .entry(entry_name)
                    .mark_not_restored(e.to_string());
                Ok(None)
            }
        }
    }

    /// Save one report entry, applying the provider error policy
    pub async fn save_entry(
        &self,
        entry_name: &str,
        paths: &[String],
        key: &str,
    ) -> GradleCacheResult<SaveOutcome> {
        match self.provider.save_cache(paths, key).await {
            Ok(saved) => {
                info!("Saved {} with cache key {}", entry_name, saved.key);
                self.report
                    .lock()
                    .await
                    .entry(entry_name)
                    .mark_saved(&saved.key, saved.size);
                Ok(SaveOutcome::Saved(saved))
            }
            Err(ProviderError::Reserved(_)) => {
                info!("Cache entry {} already exists", key);
                self.report
                    .lock()
                    .await
                    .entry(entry_name)
                    .mark_already_exists(key);
                Ok(SaveOutcome::AlreadyExists)
            }
            Err(ProviderError::Validation(reason)) => Err(GradleCacheError::CacheValidation(reason)),
            Err(e) => {
                warn!("Failed to save {}: {}", key, e);
                self.report
                    .lock()
                    .await
                    .entry(entry_name)
                    .mark_not_saved(e.to_string());
                Ok(SaveOutcome::Skipped)
            }
        }
    }

    pub async fn mark_not_saved(&self, entry_name: &str, reason: &str) {
        self.report
            .lock()
            .await
            .entry(entry_name)
            .mark_not_saved(reason);
    }
}

/// One logical, independently keyed bucket of persisted state
#[async_trait]
pub trait CacheDomain: Send + Sync {
    /// Domain name, used in keys and as the report entry name
    fn name(&self) -> &str;

    /// Path set handed to the provider
    fn paths(&self) -> Vec<String>;

    /// Whether the cached output is present on disk
    fn output_exists(&self) -> bool;

    /// Runs after a successful restore; failures are downgraded to warnings
    async fn after_restore(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
        Ok(())
    }

    /// Runs after a successful restore once every domain has finished
    /// restoring, so the report is complete; failures are downgraded to warnings
    async fn after_restore_all(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
        Ok(())
    }

    /// Runs before saving; failure aborts this domain's save
    async fn before_save(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
        Ok(())
    }
}

/// Drives the restore/save protocol for one domain
pub struct CacheOrchestrator {
    domain: Box<dyn CacheDomain>,
}

impl CacheOrchestrator {
    pub fn new(domain: Box<dyn CacheDomain>) -> Self {
        Self { domain }
    }

    pub fn name(&self) -> &str {
        self.domain.name()
    }

    /// Restore phase; the returned state must be handed to `save`
    pub async fn restore(&self, ctx: &CacheContext) -> GradleCacheResult<Option<DomainState>> {
        let name = self.domain.name();

        if self.domain.output_exists() {
            info!("{} already exists: will not restore from cache", name);
            return Ok(None);
        }

        let key = ctx.keys().derive(name);

        if ctx.options().write_only {
            info!("Cache is write-only: will not restore {} from cache", name);
            ctx.report()
                .lock()
                .await
                .entry(name)
                .mark_not_restored("cache is write-only");
            return Ok(Some(DomainState::new(key.key, None)));
        }

        let paths = self.domain.paths();
        let hit = ctx
            .restore_entry(name, &paths, &key.key, &key.restore_keys)
            .await?;

        let Some(hit) = hit else {
            info!("No {} cache found for key {}", name, key.key);
            return Ok(Some(DomainState::new(key.key, None)));
        };

        if let Some(e) = hook_failure(self.domain.after_restore(ctx).await)? {
            warn!("Restore {} failed in 'after_restore' step: {}", name, e);
        }

        Ok(Some(DomainState::new(key.key, Some(hit.key))))
    }

    /// Completes the restore phase after every domain has been restored
    pub async fn finish_restore(
        &self,
        ctx: &CacheContext,
        state: &DomainState,
    ) -> GradleCacheResult<()> {
        if state.matched_key.is_none() {
            return Ok(());
        }
        if let Some(e) = hook_failure(self.domain.after_restore_all(ctx).await)? {
            warn!(
                "Restore {} failed in 'after_restore_all' step: {}",
                self.domain.name(),
                e
            );
        }
        Ok(())
    }

    /// Save phase, given what the restore phase recorded for this domain
    pub async fn save(
        &self,
        ctx: &CacheContext,
        state: Option<&DomainState>,
    ) -> GradleCacheResult<()> {
        let name = self.domain.name();

        if ctx.options().read_only {
            debug!("Cache is read-only: will not save {}", name);
            ctx.mark_not_saved(name, "cache is read-only").await;
            return Ok(());
        }

        if !self.domain.output_exists() {
            debug!("No {} to cache", name);
            ctx.mark_not_saved(name, "no output to cache").await;
            return Ok(());
        }

        let Some(state) = state else {
            info!("{} existed before caching was attempted: will not save", name);
            ctx.mark_not_saved(name, "existed before the restore step")
                .await;
            return Ok(());
        };

        if state.is_exact_hit() {
            info!(
                "Cache hit occurred on the cache key {}, not saving {}",
                state.cache_key, name
            );
            ctx.mark_not_saved(name, "cache hit on the exact key").await;
            return Ok(());
        }

        if let Some(e) = hook_failure(self.domain.before_save(ctx).await)? {
            warn!("Save {} failed in 'before_save' step: {}", name, e);
            ctx.mark_not_saved(name, &format!("before_save failed: {}", e))
                .await;
            return Ok(());
        }

        info!("Caching {} with cache key {}", name, state.cache_key);
        ctx.save_entry(name, &self.domain.paths(), &state.cache_key)
            .await?;
        Ok(())
    }
}

/// Split a hook result into a fatal error and a downgradable one
fn hook_failure(result: GradleCacheResult<()>) -> GradleCacheResult<Option<GradleCacheError>> {
    match result {
        Ok(()) => Ok(None),
        Err(e @ GradleCacheError::CacheValidation(_)) => Err(e),
        Err(e) => Ok(Some(e)),
    }
}

/// Restore every domain concurrently, then run the joined hooks in order
pub async fn restore_all(
    orchestrators: &[CacheOrchestrator],
    ctx: &CacheContext,
) -> GradleCacheResult<BTreeMap<String, DomainState>> {
    let results = try_join_all(orchestrators.iter().map(|o| async move {
        o.restore(ctx).await.map(|state| (o.name().to_string(), state))
    }))
    .await?;

    let states: BTreeMap<String, DomainState> = results
        .into_iter()
        .filter_map(|(name, state)| state.map(|s| (name, s)))
        .collect();

    for orchestrator in orchestrators {
        if let Some(state) = states.get(orchestrator.name()) {
            orchestrator.finish_restore(ctx, state).await?;
        }
    }

    Ok(states)
}

/// Save every domain concurrently
pub async fn save_all(
    orchestrators: &[CacheOrchestrator],
    ctx: &CacheContext,
    state: &PhaseState,
) -> GradleCacheResult<()> {
    try_join_all(
        orchestrators
            .iter()
            .map(|o| o.save(ctx, state.domain(o.name()))),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::key::{KeyIdentity, CACHE_PROTOCOL_VERSION};
    use crate::cache::provider::ProviderResult;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Failure {
        Unavailable,
        Validation,
        Reserved,
    }

    /// In-memory provider recording every call
    #[derive(Default)]
    pub struct FakeProvider {
        pub entries: StdMutex<HashMap<String, u64>>,
        pub saves: StdMutex<Vec<String>>,
        pub restores: StdMutex<Vec<String>>,
        pub fail_restore: StdMutex<Option<Failure>>,
        pub fail_save: StdMutex<Option<Failure>>,
    }

    impl FakeProvider {
        pub fn with_entry(key: &str, size: u64) -> Self {
            let provider = Self::default();
            provider.entries.lock().unwrap().insert(key.to_string(), size);
            provider
        }

        pub fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }
    }

    fn failure(kind: Failure, key: &str) -> ProviderError {
        match kind {
            Failure::Unavailable => ProviderError::Unavailable("503".to_string()),
            Failure::Validation => ProviderError::Validation("bad key".to_string()),
            Failure::Reserved => ProviderError::Reserved(key.to_string()),
        }
    }

    #[async_trait]
    impl CacheProvider for FakeProvider {
        async fn restore_cache(
            &self,
            _paths: &[String],
            primary_key: &str,
            restore_keys: &[String],
        ) -> ProviderResult<Option<StoredEntry>> {
            self.restores.lock().unwrap().push(primary_key.to_string());
            if let Some(kind) = *self.fail_restore.lock().unwrap() {
                return Err(failure(kind, primary_key));
            }
            let entries = self.entries.lock().unwrap();
            if let Some(size) = entries.get(primary_key) {
                return Ok(Some(StoredEntry {
                    key: primary_key.to_string(),
                    size: *size,
                }));
            }
            for prefix in restore_keys {
                if let Some((key, size)) = entries.iter().find(|(k, _)| k.starts_with(prefix.as_str())) {
                    return Ok(Some(StoredEntry {
                        key: key.clone(),
                        size: *size,
                    }));
                }
            }
            Ok(None)
        }

        async fn save_cache(&self, _paths: &[String], key: &str) -> ProviderResult<StoredEntry> {
            self.saves.lock().unwrap().push(key.to_string());
            if let Some(kind) = *self.fail_save.lock().unwrap() {
                return Err(failure(kind, key));
            }
            self.entries.lock().unwrap().insert(key.to_string(), 100);
            Ok(StoredEntry {
                key: key.to_string(),
                size: 100,
            })
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    pub fn test_keys() -> KeyDerivation {
        KeyDerivation::new(
            KeyIdentity {
                prefix: String::new(),
                protocol_version: CACHE_PROTOCOL_VERSION.to_string(),
                environment_id: "Linux".to_string(),
                job_id: "build".to_string(),
                job_instance_id: "m".to_string(),
                job_execution_id: "sha".to_string(),
            },
            false,
        )
    }

    pub fn context(provider: Arc<FakeProvider>, options: CacheOptions) -> CacheContext {
        CacheContext::new(provider, test_keys(), CacheReport::new(), options)
    }

    #[derive(Default)]
    struct TestDomain {
        exists: AtomicBool,
        fail_after_restore: bool,
        fail_before_save: bool,
        /// Hooks fail with a provider validation error instead
        invalid_key: bool,
        after_restore_calls: AtomicUsize,
        after_restore_all_calls: AtomicUsize,
        before_save_calls: AtomicUsize,
    }

    impl TestDomain {
        fn hook_error(&self, message: &str) -> GradleCacheError {
            if self.invalid_key {
                GradleCacheError::CacheValidation(format!("{message}: key cannot contain commas"))
            } else {
                GradleCacheError::Internal(message.to_string())
            }
        }
    }

    #[async_trait]
    impl CacheDomain for Arc<TestDomain> {
        fn name(&self) -> &str {
            "gradle"
        }

        fn paths(&self) -> Vec<String> {
            vec!["/tmp/gradle-home/caches".to_string()]
        }

        fn output_exists(&self) -> bool {
            self.exists.load(Ordering::SeqCst)
        }

        async fn after_restore(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
            self.after_restore_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after_restore {
                return Err(self.hook_error("boom"));
            }
            Ok(())
        }

        async fn after_restore_all(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
            self.after_restore_all_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn before_save(&self, _ctx: &CacheContext) -> GradleCacheResult<()> {
            self.before_save_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_before_save {
                return Err(self.hook_error("locked"));
            }
            Ok(())
        }
    }

    const KEY: &str = "v1-gradle|Linux|build[m]-sha";

    fn orchestrator(domain: &Arc<TestDomain>) -> CacheOrchestrator {
        CacheOrchestrator::new(Box::new(domain.clone()))
    }

    #[tokio::test]
    async fn restore_skipped_when_output_exists() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain::default());
        domain.exists.store(true, Ordering::SeqCst);

        let state = orchestrator(&domain).restore(&ctx).await.unwrap();

        assert!(state.is_none());
        assert!(provider.restores.lock().unwrap().is_empty());
        assert!(ctx.into_report().cache_entries.is_empty());
    }

    #[tokio::test]
    async fn restore_partial_hit_then_save() {
        let provider = Arc::new(FakeProvider::with_entry("v1-gradle|Linux|build[m]-old", 10));
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain::default());
        let orch = orchestrator(&domain);

        let state = orch.restore(&ctx).await.unwrap().unwrap();
        assert_eq!(state.cache_key, KEY);
        assert_eq!(state.matched_key.as_deref(), Some("v1-gradle|Linux|build[m]-old"));
        assert_eq!(domain.after_restore_calls.load(Ordering::SeqCst), 1);

        domain.exists.store(true, Ordering::SeqCst);
        orch.save(&ctx, Some(&state)).await.unwrap();

        assert_eq!(*provider.saves.lock().unwrap(), vec![KEY.to_string()]);
        let report = ctx.into_report();
        let entry = report.get("gradle").unwrap();
        assert_eq!(entry.requested_key.as_deref(), Some(KEY));
        assert_eq!(entry.restored_size, Some(10));
        assert_eq!(entry.saved_key.as_deref(), Some(KEY));
        assert!(report.fully_restored());
    }

    #[tokio::test]
    async fn exact_hit_skips_save() {
        let provider = Arc::new(FakeProvider::with_entry(KEY, 10));
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain::default());
        let orch = orchestrator(&domain);

        let state = orch.restore(&ctx).await.unwrap().unwrap();
        domain.exists.store(true, Ordering::SeqCst);
        orch.save(&ctx, Some(&state)).await.unwrap();

        assert_eq!(provider.save_count(), 0);
        assert_eq!(domain.before_save_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_records_unrestored_request() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain::default());

        let state = orchestrator(&domain).restore(&ctx).await.unwrap().unwrap();

        assert!(state.matched_key.is_none());
        assert_eq!(domain.after_restore_calls.load(Ordering::SeqCst), 0);
        assert!(!ctx.fully_restored().await);
    }

    #[tokio::test]
    async fn transient_restore_failure_is_a_miss() {
        let provider = Arc::new(FakeProvider::default());
        *provider.fail_restore.lock().unwrap() = Some(Failure::Unavailable);
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain::default());

        let state = orchestrator(&domain).restore(&ctx).await.unwrap().unwrap();

        assert!(state.matched_key.is_none());
        let report = ctx.into_report();
        assert!(report.get("gradle").unwrap().not_restored.is_some());
    }

    #[tokio::test]
    async fn validation_failure_is_fatal() {
        let provider = Arc::new(FakeProvider::default());
        *provider.fail_restore.lock().unwrap() = Some(Failure::Validation);
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain::default());

        let err = orchestrator(&domain).restore(&ctx).await.unwrap_err();
        assert!(matches!(err, GradleCacheError::CacheValidation(_)));
    }

    #[tokio::test]
    async fn after_restore_failure_is_not_fatal() {
        let provider = Arc::new(FakeProvider::with_entry(KEY, 1));
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain {
            fail_after_restore: true,
            ..TestDomain::default()
        });

        let state = orchestrator(&domain).restore(&ctx).await.unwrap().unwrap();
        assert!(state.is_exact_hit());
    }

    #[tokio::test]
    async fn save_skipped_without_restore_state() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain::default());
        domain.exists.store(true, Ordering::SeqCst);

        orchestrator(&domain).save(&ctx, None).await.unwrap();

        assert_eq!(provider.save_count(), 0);
        assert!(ctx.into_report().get("gradle").unwrap().not_saved.is_some());
    }

    #[tokio::test]
    async fn save_skipped_when_output_missing() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain::default());

        let state = DomainState::new(KEY, None);
        orchestrator(&domain).save(&ctx, Some(&state)).await.unwrap();

        assert_eq!(provider.save_count(), 0);
        let report = ctx.into_report();
        assert_eq!(
            report.get("gradle").unwrap().not_saved.as_deref(),
            Some("no output to cache")
        );
    }

    #[tokio::test]
    async fn reserved_key_is_already_exists() {
        let provider = Arc::new(FakeProvider::default());
        *provider.fail_save.lock().unwrap() = Some(Failure::Reserved);
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain::default());
        domain.exists.store(true, Ordering::SeqCst);

        let state = DomainState::new(KEY, None);
        orchestrator(&domain).save(&ctx, Some(&state)).await.unwrap();

        let report = ctx.into_report();
        assert!(report.get("gradle").unwrap().already_existed());
    }

    #[tokio::test]
    async fn before_save_failure_aborts_save() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain {
            fail_before_save: true,
            ..TestDomain::default()
        });
        domain.exists.store(true, Ordering::SeqCst);

        let state = DomainState::new(KEY, None);
        orchestrator(&domain).save(&ctx, Some(&state)).await.unwrap();

        assert_eq!(provider.save_count(), 0);
        let report = ctx.into_report();
        assert!(report
            .get("gradle")
            .unwrap()
            .not_saved
            .as_deref()
            .unwrap()
            .contains("locked"));
    }

    #[tokio::test]
    async fn read_only_never_saves() {
        let provider = Arc::new(FakeProvider::default());
        let options = CacheOptions {
            read_only: true,
            ..CacheOptions::default()
        };
        let ctx = context(provider.clone(), options);
        let domain = Arc::new(TestDomain::default());
        domain.exists.store(true, Ordering::SeqCst);

        let state = DomainState::new(KEY, None);
        orchestrator(&domain).save(&ctx, Some(&state)).await.unwrap();
        assert_eq!(provider.save_count(), 0);
        assert_eq!(domain.before_save_calls.load(Ordering::SeqCst), 0);

        let report = ctx.into_report();
        assert_eq!(
            report.get("gradle").unwrap().not_saved.as_deref(),
            Some("cache is read-only")
        );
    }

    #[tokio::test]
    async fn write_only_skips_restore_but_allows_save() {
        let provider = Arc::new(FakeProvider::with_entry(KEY, 1));
        let options = CacheOptions {
            write_only: true,
            ..CacheOptions::default()
        };
        let ctx = context(provider.clone(), options);
        let domain = Arc::new(TestDomain::default());
        let orch = orchestrator(&domain);

        let state = orch.restore(&ctx).await.unwrap().unwrap();
        assert!(provider.restores.lock().unwrap().is_empty());
        assert!(state.matched_key.is_none());

        domain.exists.store(true, Ordering::SeqCst);
        orch.save(&ctx, Some(&state)).await.unwrap();
        assert_eq!(provider.save_count(), 1);
    }

    #[tokio::test]
    async fn restore_all_collects_states() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain::default());

        let states = restore_all(&[orchestrator(&domain)], &ctx).await.unwrap();
        assert_eq!(states.get("gradle").unwrap().cache_key, KEY);
        assert_eq!(domain.after_restore_all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn restore_all_runs_joined_hook_after_hit() {
        let provider = Arc::new(FakeProvider::with_entry(KEY, 1));
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain::default());

        restore_all(&[orchestrator(&domain)], &ctx).await.unwrap();

        assert_eq!(domain.after_restore_calls.load(Ordering::SeqCst), 1);
        assert_eq!(domain.after_restore_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_in_after_restore_is_fatal() {
        let provider = Arc::new(FakeProvider::with_entry(KEY, 1));
        let ctx = context(provider, CacheOptions::default());
        let domain = Arc::new(TestDomain {
            fail_after_restore: true,
            invalid_key: true,
            ..TestDomain::default()
        });

        let err = orchestrator(&domain).restore(&ctx).await.unwrap_err();
        assert!(matches!(err, GradleCacheError::CacheValidation(_)));
    }

    #[tokio::test]
    async fn validation_failure_in_before_save_is_fatal() {
        let provider = Arc::new(FakeProvider::default());
        let ctx = context(provider.clone(), CacheOptions::default());
        let domain = Arc::new(TestDomain {
            fail_before_save: true,
            invalid_key: true,
            ..TestDomain::default()
        });
        domain.exists.store(true, Ordering::SeqCst);

        let state = DomainState::new(KEY, None);
        let err = orchestrator(&domain)
            .save(&ctx, Some(&state))
            .await
            .unwrap_err();

        assert!(matches!(err, GradleCacheError::CacheValidation(_)));
        assert_eq!(provider.save_count(), 0);
    }
}
