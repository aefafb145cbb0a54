//! Restore command - restore cached Gradle state at the start of a job

use crate::cache::handoff::{self, PhaseState};
use crate::cache::orchestrator::restore_all;
use crate::cache::CacheCleaner;
use crate::cli::commands::{cache_context, new_report, orchestrators};
use crate::config::{Config, ConfigManager};
use crate::error::GradleCacheResult;
use console::style;
use tracing::info;

/// Execute the restore command
pub async fn execute(config: &Config) -> GradleCacheResult<()> {
    if handoff::already_set_up() {
        info!("Cache restore already ran in this job: skipping");
        return Ok(());
    }

    let state_file = ConfigManager::state_file(config);
    let report = new_report(config);

    if report.cache_disabled {
        info!("Cache is disabled: will not restore state from previous builds");
        PhaseState::new(&report)?.save(&state_file).await?;
        return handoff::mark_set_up().await;
    }

    let ctx = cache_context(config, report);
    let domains = restore_all(&orchestrators(config)?, &ctx).await?;

    if config.cache.cleanup && !config.cache.read_only {
        let home = ConfigManager::gradle_user_home(config)?;
        CacheCleaner::new(home, config.paths.gradle_executable.clone())
            .prepare()
            .await?;
    }

    let report = ctx.into_report();
    let restored = report
        .cache_entries
        .iter()
        .filter(|e| e.restored_key.is_some())
        .count();

    let mut state = PhaseState::new(&report)?;
    state.domains = domains;
    state.save(&state_file).await?;
    handoff::mark_set_up().await?;

    println!(
        "{} Restored {} of {} cache entries",
        style("✓").green(),
        restored,
        report.cache_entries.len()
    );
    Ok(())
}
