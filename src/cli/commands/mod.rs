//! CLI command implementations

pub mod config;
pub mod report;
pub mod restore;
pub mod save;

pub use config::execute as config;
pub use report::execute as report;
pub use restore::execute as restore;
pub use save::execute as save;

use crate::cache::{
    CacheContext, CacheOptions, CacheOrchestrator, CacheProvider, CacheReport, GradleHomeDomain,
    KeyDerivation, KeyIdentity, LocalCacheProvider, ProjectDomain,
};
use crate::config::{Config, ConfigManager};
use crate::error::GradleCacheResult;
use std::sync::Arc;
use tracing::debug;

/// Build the shared context for one phase of the job
pub(crate) fn cache_context(config: &Config, report: CacheReport) -> CacheContext {
    let store = ConfigManager::store_dir(config);
    let branch = ConfigManager::branch(config);
    let provider = LocalCacheProvider::new(&store)
        .with_scope(branch.clone(), Some(config.scope.default_branch.clone()));
    debug!(
        "Using {} cache store {} (branch {})",
        provider.provider_name(),
        store.display(),
        branch.as_deref().unwrap_or("none")
    );

    let keys = KeyDerivation::new(
        KeyIdentity::from_env(&config.cache),
        config.cache.strict_match,
    );
    let options = CacheOptions {
        read_only: config.cache.read_only,
        write_only: config.cache.write_only,
        debug: config.cache.debug,
    };

    CacheContext::new(Arc::new(provider), keys, report, options)
}

/// One orchestrator per cache domain
pub(crate) fn orchestrators(config: &Config) -> GradleCacheResult<Vec<CacheOrchestrator>> {
    Ok(vec![
        CacheOrchestrator::new(Box::new(GradleHomeDomain::from_config(config)?)),
        CacheOrchestrator::new(Box::new(ProjectDomain::from_config(config)?)),
    ])
}

/// Fresh report carrying the run-level flags
pub(crate) fn new_report(config: &Config) -> CacheReport {
    let mut report = CacheReport::new();
    report.cache_read_only = config.cache.read_only;
    report.cache_write_only = config.cache.write_only;
    if config.cache.disabled {
        report.set_disabled(config.cache.disabled_reason.clone());
    }
    report
}
