//! Build then test a workspace between cache restore and save

use crate::error::{ToolcribError, ToolcribResult};
use crate::workspace::session::{check_test_exit, SaveOutcome, WorkspaceCacheKey, WorkspaceCacheSession};
use crate::workspace::{BuildTool, SourceControl};
use tracing::info;

/// Target pattern matching every target in the workspace
pub const FULL_TARGET_UNIVERSE: &str = "//...";

/// Options for one build/test run
#[derive(Debug, Clone)]
pub struct BuildTestOptions {
    /// Extra options passed to both build and test
    pub build_options: Vec<String>,
    /// Target patterns (empty means the full universe)
    pub targets: Vec<String>,
    /// Test exit codes that do not fail the run
    pub accepted_test_exit_codes: Vec<i32>,
    /// Whether a successful run may save the cache
    pub save_cache: bool,
}

impl Default for BuildTestOptions {
    fn default() -> Self {
        Self {
            build_options: Vec::new(),
            targets: Vec::new(),
            accepted_test_exit_codes: vec![0, 4],
            save_cache: true,
        }
    }
}

impl BuildTestOptions {
    /// `--keep_going` followed by the non-blank configured options
    pub fn build_args(&self) -> Vec<String> {
        std::iter::once("--keep_going".to_string())
            .chain(
                self.build_options
                    .iter()
                    .map(|o| o.trim())
                    .filter(|o| !o.is_empty())
                    .map(str::to_string),
            )
            .collect()
    }

    /// `--test_output=errors` followed by the build options
    pub fn test_args(&self) -> Vec<String> {
        std::iter::once("--test_output=errors".to_string())
            .chain(self.build_args())
            .collect()
    }

    /// Targets to build, defaulting to the full universe
    pub fn target_patterns(&self) -> Vec<String> {
        if self.targets.is_empty() {
            vec![FULL_TARGET_UNIVERSE.to_string()]
        } else {
            self.targets.clone()
        }
    }

    /// True when the run builds and tests every target
    pub fn covers_everything(&self) -> bool {
        self.target_patterns() == [FULL_TARGET_UNIVERSE]
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct BuildTestReport {
    pub key: WorkspaceCacheKey,
    pub restored_key: Option<String>,
    pub test_exit_code: i32,
    pub save: SaveOutcome,
}

/// Drives restore, build, test and save for one workspace
pub struct BuildTestRunner<'a> {
    tool: &'a dyn BuildTool,
    vcs: &'a dyn SourceControl,
    session: &'a WorkspaceCacheSession,
    options: BuildTestOptions,
}

impl<'a> BuildTestRunner<'a> {
    pub fn new(
        tool: &'a dyn BuildTool,
        vcs: &'a dyn SourceControl,
        session: &'a WorkspaceCacheSession,
        options: BuildTestOptions,
    ) -> Self {
        Self {
            tool,
            vcs,
            session,
            options,
        }
    }

    /// Run the whole sequence
    ///
    /// A failing build or an unaccepted test exit code aborts before any
    /// cache save.
    pub async fn run(&self) -> ToolcribResult<BuildTestReport> {
        let (key, restored_key) = self.session.begin(self.tool, self.vcs).await?;

        let targets = self.options.target_patterns();

        let build_code = self.tool.build(&self.options.build_args(), &targets).await?;
        if build_code != 0 {
            return Err(ToolcribError::BuildFailed { code: build_code });
        }

        let test_exit_code = self.tool.test(&self.options.test_args(), &targets).await?;
        check_test_exit(test_exit_code, &self.options.accepted_test_exit_codes)?;
        info!("Tests finished with exit code {}", test_exit_code);

        let save = if self.options.save_cache {
            self.session
                .end(&key, true, self.options.covers_everything())
                .await?
        } else {
            SaveOutcome::Skipped("cache saving disabled".to_string())
        };
        if let SaveOutcome::Skipped(reason) = &save {
            info!("Not saving workspace cache: {}", reason);
        }

        Ok(BuildTestReport {
            key,
            restored_key,
            test_exit_code,
            save,
        })
    }
}
