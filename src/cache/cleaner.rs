//! Gradle User Home garbage collection
//!
//! Gradle prunes unused cache entries on its own schedule, driven by
//! `gc.properties` timestamps and the file-access journal. `prepare` keeps
//! the job's own build from triggering cleanup; `force_cleanup` makes it due
//! and runs a no-op build so Gradle prunes before we snapshot the home.

use crate::cache::hash::rooted_pattern;
use crate::error::{GradleCacheError, GradleCacheResult};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

const FILE_ACCESS_JOURNAL: &str = "caches/journal-1/file-access.bin";
const GC_MARKERS: &str = "**/gc.properties";

const SETTINGS_GRADLE: &str = "rootProject.name = 'gradle-cache-cleanup'\n";

const BUILD_GRADLE: &str = "task(\"noop\") {}\n";

const INIT_GRADLE: &str = r#"beforeSettings { settings ->
    settings.caches {
        cleanup = Cleanup.ALWAYS

        releasedWrappers.removeUnusedEntriesAfterDays = 1
        snapshotWrappers.removeUnusedEntriesAfterDays = 1
        downloadedResources.removeUnusedEntriesAfterDays = 1
        createdResources.removeUnusedEntriesAfterDays = 1
        buildCache.removeUnusedEntriesAfterDays = 1
    }
}
"#;

/// Prepares and forces Gradle's own cache cleanup
#[derive(Debug, Clone)]
pub struct CacheCleaner {
    gradle_user_home: PathBuf,
    gradle_executable: String,
}

impl CacheCleaner {
    pub fn new(gradle_user_home: impl Into<PathBuf>, gradle_executable: impl Into<String>) -> Self {
        Self {
            gradle_user_home: gradle_user_home.into(),
            gradle_executable: gradle_executable.into(),
        }
    }

    /// Make the home look freshly cleaned so the job's build leaves it alone
    pub async fn prepare(&self) -> GradleCacheResult<()> {
        let journal = self.gradle_user_home.join(FILE_ACCESS_JOURNAL);
        match fs::remove_file(&journal).await {
            Ok(()) => debug!("Removed {}", journal.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(GradleCacheError::io(
                    format!("removing {}", journal.display()),
                    e,
                ))
            }
        }

        let touched = set_marker_times(&self.gradle_user_home, FileTime::now()).await?;
        debug!("Touched {} gc.properties files", touched);
        Ok(())
    }

    /// Age the cleanup markers and run a no-op build so Gradle prunes now
    pub async fn force_cleanup(&self) -> GradleCacheResult<()> {
        let aged = set_marker_times(&self.gradle_user_home, FileTime::zero()).await?;
        debug!("Aged {} gc.properties files", aged);

        let scratch = tempfile::Builder::new()
            .prefix("gradle-cache-cleanup-")
            .tempdir()
            .map_err(|e| GradleCacheError::io("creating cleanup project", e))?;
        write_cleanup_project(scratch.path()).await?;

        info!(
            "Forcing Gradle User Home cleanup in {}",
            self.gradle_user_home.display()
        );
        self.run_noop_build(scratch.path()).await
    }

    async fn run_noop_build(&self, project_dir: &Path) -> GradleCacheResult<()> {
        let home = self.gradle_user_home.to_string_lossy().into_owned();
        let args = [
            "-g",
            home.as_str(),
            "--no-daemon",
            "--no-scan",
            "--quiet",
            "--init-script",
            "init.gradle",
            "noop",
        ];
        let command = format!("{} {}", self.gradle_executable, args.join(" "));
        debug!("Executing: {}", command);

        let output = Command::new(&self.gradle_executable)
            .args(args)
            .current_dir(project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GradleCacheError::command_failed(command.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GradleCacheError::command_exec(command, stderr.trim()));
        }
        Ok(())
    }
}

async fn write_cleanup_project(dir: &Path) -> GradleCacheResult<()> {
    for (name, content) in [
        ("settings.gradle", SETTINGS_GRADLE),
        ("build.gradle", BUILD_GRADLE),
        ("init.gradle", INIT_GRADLE),
    ] {
        fs::write(dir.join(name), content)
            .await
            .map_err(|e| GradleCacheError::io(format!("writing cleanup {}", name), e))?;
    }
    Ok(())
}

/// Set access and modification time of every gc marker under `home`
async fn set_marker_times(home: &Path, time: FileTime) -> GradleCacheResult<usize> {
    let pattern = rooted_pattern(home, GC_MARKERS);

    tokio::task::spawn_blocking(move || -> GradleCacheResult<usize> {
        let mut count = 0;
        for path in glob::glob(&pattern)?.flatten() {
            if !path.is_file() {
                continue;
            }
            filetime::set_file_times(&path, time, time).map_err(|e| {
                GradleCacheError::Cleanup(format!("setting times on {}: {}", path.display(), e))
            })?;
            count += 1;
        }
        Ok(count)
    })
    .await
    .map_err(|e| GradleCacheError::Internal(format!("timestamp task failed: {e}")))?
}
