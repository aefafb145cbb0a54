//! gradle-cache - Gradle build state caching for CI
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use gradle_cache::cli::{commands, Cli, Commands};
use gradle_cache::config::{Config, ConfigManager};
use gradle_cache::error::GradleCacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GradleCacheResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = manager.load().await?;
    cli.flags.apply(&mut config);

    init_logging(cli.verbose, &config);
    debug!("Loaded configuration from {}", manager.path().display());

    match cli.command {
        Commands::Restore => commands::restore(&config).await,
        Commands::Save => commands::save(&config).await,
        Commands::Report(args) => commands::report(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `cache.debug` forces debug
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        _ if config.cache.debug => "debug",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::new(format!("gradle_cache={}", level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
