//! Integration tests for Toolcrib

mod common;
mod workspace;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn toolcrib(config_dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("toolcrib");
        cmd.env("TOOLCRIB_CONFIG", config_dir.join("config.toml"))
            .env_remove("GITHUB_ACTIONS")
            .env_remove("TOOLCRIB_CACHE_DIR")
            .env_remove("TOOLCRIB_INSTALL_DIR")
            .env_remove("TOOLCRIB_LOG_FORMAT");
        cmd
    }

    fn with_cache_dir(temp: &TempDir) {
        let cache = temp.path().join("cache");
        std::fs::write(
            temp.path().join("config.toml"),
            format!("[cache]\ndir = {:?}\n", cache.to_string_lossy()),
        )
        .unwrap();
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("install-tools"))
            .stdout(predicate::str::contains("build-test"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("toolcrib"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[workspace]"))
            .stdout(predicate::str::contains("bazelisk"));
    }

    #[test]
    fn config_init_then_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(temp.path().join("config.toml").exists());

        toolcrib(temp.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[cache]\ngc_days = \"soon\"\n").unwrap();
        toolcrib(temp.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn tools_list_plain() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .args(["tools", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("addlicense\nbuildifier\ngoogle-java-format\nktfmt\nktlint\n");
    }

    #[test]
    fn tools_list_json() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .args(["tools", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"kind\": \"jar\""));
    }

    #[test]
    fn tools_digest() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("hello.txt");
        std::fs::write(&file, "hello world").unwrap();
        toolcrib(temp.path())
            .args(["tools", "digest"])
            .arg(&file)
            .assert()
            .success()
            .stdout(predicate::str::starts_with(
                "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
            ));
    }

    #[test]
    fn invalid_manifest_fails() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("tools.toml");
        std::fs::write(
            &manifest,
            "[[tool]]\nname = \"x\"\nversion = \"1\"\nsha256 = \"deadbeef\"\nfetch = { kind = \"executable\", url = \"https://example.com/x\" }\n",
        )
        .unwrap();
        toolcrib(temp.path())
            .args(["tools", "list", "--manifest"])
            .arg(&manifest)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        with_cache_dir(&temp);
        toolcrib(temp.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));
    }

    #[test]
    fn cache_dir_from_environment() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("env-cache");
        toolcrib(temp.path())
            .env("TOOLCRIB_CACHE_DIR", &cache)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains(cache.to_string_lossy().into_owned()));

        toolcrib(temp.path())
            .env("TOOLCRIB_CACHE_DIR", &cache)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));
    }

    #[test]
    fn cache_gc_empty() {
        let temp = TempDir::new().unwrap();
        with_cache_dir(&temp);
        toolcrib(temp.path())
            .args(["cache", "gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries older than 30 days"));
    }

    #[test]
    fn build_test_rejects_non_yaml_bool() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .args(["build-test", "--save-cache", "yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("YAML 1.2 Core Schema"));
    }

    #[test]
    fn upload_testlogs_requires_dest() {
        let temp = TempDir::new().unwrap();
        toolcrib(temp.path())
            .arg("upload-testlogs")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--dest"));
    }
}
