//! Save command - save Gradle state at the end of a job

use crate::cache::domain::GRADLE_HOME_DOMAIN;
use crate::cache::handoff::PhaseState;
use crate::cache::orchestrator::save_all;
use crate::cache::CacheCleaner;
use crate::cli::commands::{cache_context, orchestrators};
use crate::config::{Config, ConfigManager};
use crate::error::GradleCacheResult;
use tracing::{info, warn};

/// Execute the save command
pub async fn execute(config: &Config) -> GradleCacheResult<()> {
    let state_file = ConfigManager::state_file(config);

    let Some(mut state) = PhaseState::load(&state_file).await? else {
        warn!(
            "No cache state at {}: restore did not run in this job, not saving",
            state_file.display()
        );
        return Ok(());
    };

    let report = state.report()?;
    if report.cache_disabled {
        info!("Cache is disabled: will not save state for later builds");
        print!("{}", report.render());
        return Ok(());
    }

    if config.cache.cleanup && !config.cache.read_only {
        if state.domain(GRADLE_HOME_DOMAIN).is_some() {
            let home = ConfigManager::gradle_user_home(config)?;
            CacheCleaner::new(home, config.paths.gradle_executable.clone())
                .force_cleanup()
                .await?;
        } else {
            info!("Gradle User Home was not restored by this job: skipping cleanup");
        }
    }

    let ctx = cache_context(config, report);
    save_all(&orchestrators(config)?, &ctx, &state).await?;

    let report = ctx.into_report();
    state.set_report(&report)?;
    state.save(&state_file).await?;

    print!("{}", report.render());
    Ok(())
}
