//! Integration tests for gradle-cache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn gradle_cache() -> Command {
        cargo_bin_cmd!("gradle-cache")
    }

    #[test]
    fn help_displays() {
        gradle_cache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Gradle build state caching"));
    }

    #[test]
    fn version_displays() {
        gradle_cache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gradle-cache"));
    }

    #[test]
    fn config_path() {
        gradle_cache()
            .args(["config", "path"])
            .env_remove("GRADLE_CACHE_CONFIG")
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        gradle_cache()
            .args(["config", "show"])
            .env_remove("GRADLE_CACHE_CONFIG")
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("artifact_type = \"dependencies\""));
    }

    #[test]
    fn invalid_config_fails_with_hint() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\n").unwrap();

        gradle_cache()
            .arg("--config")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn unknown_report_format_rejected() {
        gradle_cache()
            .args(["report", "--format", "xml"])
            .assert()
            .failure();
    }
}

mod cache_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Workspace {
        _temp: TempDir,
        root: PathBuf,
        config: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path().to_path_buf();
            let config = root.join("config.toml");
            fs::write(
                &config,
                format!(
                    "[paths]\n\
                     gradle_user_home = {:?}\n\
                     project_root = {:?}\n\
                     state_file = {:?}\n\
                     store_dir = {:?}\n",
                    root.join("home"),
                    root.join("project"),
                    root.join("state.json"),
                    root.join("store"),
                ),
            )
            .unwrap();
            Self {
                _temp: temp,
                root,
                config,
            }
        }

        fn home(&self) -> PathBuf {
            self.root.join("home")
        }

        fn project(&self) -> PathBuf {
            self.root.join("project")
        }

        fn cmd(&self, execution: &str) -> Command {
            let mut cmd = cargo_bin_cmd!("gradle-cache");
            cmd.arg("--config")
                .arg(&self.config)
                .env_remove("GITHUB_ENV")
                .env_remove("GITHUB_REF_NAME")
                .env_remove("GRADLE_CACHE_SETUP_COMPLETE")
                .env_remove("GRADLE_CACHE_KEY_PREFIX")
                .env("GRADLE_CACHE_KEY_ENVIRONMENT", "Linux")
                .env("GRADLE_CACHE_KEY_JOB", "integration")
                .env("GRADLE_CACHE_KEY_JOB_INSTANCE", "default")
                .env("GRADLE_CACHE_KEY_JOB_EXECUTION", execution);
            cmd
        }

        fn simulate_build(&self) {
            write(
                &self.home(),
                "caches/modules-2/files-2.1/com.example/lib/1.0/abc123/lib-1.0.jar",
                "jar",
            );
            write(&self.home(), "caches/modules-2/modules-2.lock", "");
            write(
                &self.home(),
                "wrapper/dists/gradle-8.5-bin/xyz/gradle-8.5-bin.zip",
                "zip",
            );
            write(&self.project(), ".gradle/8.5/checksums/checksums.lock", "");
            write(&self.project(), ".gradle/8.5/fileHashes/fileHashes.bin", "hashes");
        }
    }

    fn write(base: &Path, relative: &str, content: &str) {
        let path = base.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn report_without_state() {
        let ws = Workspace::new();
        ws.cmd("sha1")
            .arg("report")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache report found"));
    }

    #[test]
    fn save_without_restore_is_a_noop() {
        let ws = Workspace::new();
        ws.simulate_build();

        ws.cmd("sha1")
            .arg("save")
            .assert()
            .success()
            .stderr(predicate::str::contains("restore did not run"));

        assert!(!ws.root.join("store").exists());
    }

    #[test]
    fn setup_guard_skips_second_restore() {
        let ws = Workspace::new();
        ws.cmd("sha1")
            .arg("restore")
            .env("GRADLE_CACHE_SETUP_COMPLETE", "true")
            .assert()
            .success();

        assert!(!ws.root.join("state.json").exists());
    }

    #[test]
    fn setup_marker_written_to_github_env() {
        let ws = Workspace::new();
        let env_file = ws.root.join("github_env");

        ws.cmd("sha1")
            .arg("restore")
            .env("GITHUB_ENV", &env_file)
            .assert()
            .success();

        let content = fs::read_to_string(env_file).unwrap();
        assert!(content.contains("GRADLE_CACHE_SETUP_COMPLETE=true"));
    }

    #[test]
    fn failed_restore_leaves_guard_unset() {
        let ws = Workspace::new();
        let env_file = ws.root.join("github_env");

        ws.cmd("sha1")
            .arg("restore")
            .env("GITHUB_ENV", &env_file)
            .env("GRADLE_CACHE_KEY_PREFIX", "ci,linux-")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache validation failed"));

        assert!(!env_file.exists());
        assert!(!ws.root.join("state.json").exists());
    }

    #[test]
    fn disabled_cache_is_reported() {
        let ws = Workspace::new();
        ws.cmd("sha1")
            .args(["--disabled", "restore"])
            .assert()
            .success();

        ws.cmd("sha1")
            .arg("report")
            .assert()
            .success()
            .stdout(predicate::str::contains("Caching was disabled"));
    }

    #[test]
    fn save_then_restore_in_later_job() {
        let ws = Workspace::new();

        // First job: cold cache
        ws.cmd("sha1")
            .arg("restore")
            .assert()
            .success()
            .stdout(predicate::str::contains("Restored 0 of 2"));
        ws.simulate_build();
        ws.cmd("sha1")
            .arg("save")
            .assert()
            .success()
            .stdout(predicate::str::contains("Entry: gradle"))
            .stdout(predicate::str::contains("Entry: project"));

        ws.cmd("sha1")
            .args(["report", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("gradle"))
            .stdout(predicate::str::contains("dependencies: caches/modules-2/files-2.1/com.example/lib/1.0/abc123"))
            .stdout(predicate::str::contains("wrapper-zips: wrapper/dists/gradle-8.5-bin/xyz"));

        // Second job on a clean machine, different commit
        fs::remove_dir_all(ws.home()).unwrap();
        fs::remove_dir_all(ws.project()).unwrap();
        fs::remove_file(ws.root.join("state.json")).unwrap();

        ws.cmd("sha2").arg("restore").assert().success();

        let jar = ws
            .home()
            .join("caches/modules-2/files-2.1/com.example/lib/1.0/abc123/lib-1.0.jar");
        assert_eq!(fs::read_to_string(jar).unwrap(), "jar");
        assert!(ws
            .home()
            .join("wrapper/dists/gradle-8.5-bin/xyz/gradle-8.5-bin.zip")
            .exists());
        assert!(ws.project().join(".gradle/8.5/fileHashes/fileHashes.bin").exists());
        assert!(!ws.home().join("caches/modules-2/modules-2.lock").exists());

        ws.cmd("sha2")
            .args(["report", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"restoredKey\": \"v1-gradle|Linux|integration[default]-sha1\""));
    }

    #[test]
    fn read_only_job_never_saves() {
        let ws = Workspace::new();
        ws.cmd("sha1")
            .args(["--read-only", "restore"])
            .assert()
            .success();
        ws.simulate_build();
        ws.cmd("sha1")
            .args(["--read-only", "save"])
            .assert()
            .success()
            .stdout(predicate::str::contains("read-only"));

        assert!(!ws.root.join("store").exists());

        ws.cmd("sha1")
            .args(["report", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"notSaved\": \"cache is read-only\""));
    }
}
