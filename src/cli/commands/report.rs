//! Report command - show the cache report recorded for this job

use crate::cache::{CacheReport, PhaseState};
use crate::cli::args::{OutputFormat, ReportArgs};
use crate::config::{Config, ConfigManager};
use crate::error::GradleCacheResult;

/// Execute the report command
pub async fn execute(args: ReportArgs, config: &Config) -> GradleCacheResult<()> {
    let state_file = ConfigManager::state_file(config);

    let Some(state) = PhaseState::load(&state_file).await? else {
        println!("No cache report found at {}", state_file.display());
        return Ok(());
    };
    let report = state.report()?;

    match args.format {
        OutputFormat::Table => print!("{}", report.render()),
        OutputFormat::Json => print_report_json(&report)?,
        OutputFormat::Plain => print_report_plain(&report),
    }

    Ok(())
}

fn print_report_json(report: &CacheReport) -> GradleCacheResult<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn print_report_plain(report: &CacheReport) {
    for entry in &report.cache_entries {
        println!("{}", entry.entry_name);
    }
}
