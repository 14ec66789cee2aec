//! Workspace build/test scenarios with a mock build tool

use crate::common::{CountingCache, FixedTree, MockBuildTool};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use toolcrib::ci::CiEnvironment;
use toolcrib::error::ToolcribError;
use toolcrib::workspace::{BuildTestOptions, BuildTestRunner, SaveOutcome, WorkspaceCacheSession};

const EXEC_ROOT: &str = "/home/runner/.cache/bazel/_bazel_runner/abc/execroot/main";

struct Fixture {
    temp: TempDir,
    cache: Arc<CountingCache>,
    output_base: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let output_base = temp.path().join("output_base");
        std::fs::create_dir_all(output_base.join("action_cache")).unwrap();
        std::fs::write(output_base.join("action_cache/entries"), "warm").unwrap();
        Self {
            cache: Arc::new(CountingCache::new(temp.path().join("cache"))),
            temp,
            output_base,
        }
    }

    fn session(&self, event: &str) -> WorkspaceCacheSession {
        let ci = CiEnvironment::isolated(self.temp.path().to_path_buf(), self.temp.path().join("tmp"))
            .with_event(Some(event.to_string()));
        WorkspaceCacheSession::new(
            self.cache.clone(),
            "v1",
            vec!["push".to_string(), "schedule".to_string()],
            ci,
        )
    }

    fn tool(&self) -> MockBuildTool {
        MockBuildTool::new(EXEC_ROOT, &self.output_base)
    }
}

#[tokio::test]
async fn push_run_saves_and_later_tree_restores_stale_cache() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let tool = fixture.tool();

    let first = BuildTestRunner::new(&tool, &FixedTree("tree1".into()), &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(first.restored_key, None);
    assert!(matches!(first.save, SaveOutcome::Saved(_)));
    assert!(first.key.exact_key.ends_with("-tree1"));

    // Next commit on a clean machine
    std::fs::remove_dir_all(&fixture.output_base).unwrap();
    let second = BuildTestRunner::new(&tool, &FixedTree("tree2".into()), &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(second.restored_key.as_deref(), Some(first.key.exact_key.as_str()));
    assert_eq!(
        std::fs::read_to_string(fixture.output_base.join("action_cache/entries")).unwrap(),
        "warm"
    );
    assert!(matches!(second.save, SaveOutcome::Saved(_)));
    assert_eq!(fixture.cache.inner.entries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn passes_options_and_default_targets() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let tool = fixture.tool();
    let options = BuildTestOptions {
        build_options: vec!["--config=ci".to_string(), String::new()],
        ..Default::default()
    };

    BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, options)
        .run()
        .await
        .unwrap();

    assert_eq!(
        tool.invocations(),
        vec![
            vec!["build", "--keep_going", "--config=ci", "//..."],
            vec!["test", "--test_output=errors", "--keep_going", "--config=ci", "//..."],
        ]
    );
}

#[tokio::test]
async fn no_tests_exit_code_is_accepted() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let mut tool = fixture.tool();
    tool.test_code = 4;

    let report = BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.test_exit_code, 4);
    assert!(matches!(report.save, SaveOutcome::Saved(_)));
}

#[tokio::test]
async fn failing_tests_abort_before_save() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let mut tool = fixture.tool();
    tool.test_code = 3;

    let err = BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ToolcribError::TestFailure));
    assert_eq!(err.to_string(), "Testing failed");
    assert_eq!(fixture.cache.saves(), 0);
}

#[tokio::test]
async fn failing_build_skips_tests() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let mut tool = fixture.tool();
    tool.build_code = 1;

    let err = BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ToolcribError::BuildFailed { code: 1 }));
    assert_eq!(tool.invocations().len(), 1);
    assert_eq!(fixture.cache.saves(), 0);
}

#[tokio::test]
async fn pull_request_does_not_save() {
    let fixture = Fixture::new();
    let session = fixture.session("pull_request");
    let tool = fixture.tool();

    let report = BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap();

    assert!(matches!(report.save, SaveOutcome::Skipped(_)));
    assert_eq!(fixture.cache.saves(), 0);
}

#[tokio::test]
async fn partial_targets_do_not_save() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let tool = fixture.tool();
    let options = BuildTestOptions {
        targets: vec!["//src/...".to_string()],
        ..Default::default()
    };

    let report = BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, options)
        .run()
        .await
        .unwrap();

    assert!(matches!(report.save, SaveOutcome::Skipped(_)));
    assert_eq!(fixture.cache.saves(), 0);
}

#[tokio::test]
async fn second_save_of_same_key_is_a_conflict() {
    let fixture = Fixture::new();
    let session = fixture.session("schedule");
    let tool = fixture.tool();
    let tree = FixedTree("same".into());

    BuildTestRunner::new(&tool, &tree, &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap();
    let report = BuildTestRunner::new(&tool, &tree, &session, BuildTestOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.restored_key.as_deref(), Some(report.key.exact_key.as_str()));
    assert_eq!(report.save, SaveOutcome::AlreadyReserved);
}

#[tokio::test]
async fn disabled_save_skips() {
    let fixture = Fixture::new();
    let session = fixture.session("push");
    let tool = fixture.tool();
    let options = BuildTestOptions {
        save_cache: false,
        ..Default::default()
    };

    let report = BuildTestRunner::new(&tool, &FixedTree("t".into()), &session, options)
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.save,
        SaveOutcome::Skipped("cache saving disabled".to_string())
    );
}
