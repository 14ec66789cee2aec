//! Upload-testlogs command - gather test logs for artifact upload

use crate::cli::args::UploadTestlogsArgs;
use crate::cli::commands::workspace_dir;
use crate::config::Config;
use crate::error::ToolcribResult;
use crate::workspace::{collect_test_logs, Bazel, BuildTool};
use std::path::PathBuf;
use tracing::info;

/// Execute the upload-testlogs command
pub async fn execute(args: UploadTestlogsArgs, config: &Config) -> ToolcribResult<()> {
    let workspace = workspace_dir(args.workspace)?;
    let tool = Bazel::new(config.workspace.build_tool.clone(), &workspace);

    let testlogs = PathBuf::from(tool.info("bazel-testlogs").await?);
    let copied = collect_test_logs(&testlogs, &args.dest).await?;

    if copied.is_empty() {
        info!("No test logs found; skipping upload");
        println!("No test logs found; skipping upload");
        return Ok(());
    }

    println!(
        "Collected {} test log file(s) into {}",
        copied.len(),
        args.dest.display()
    );
    Ok(())
}
