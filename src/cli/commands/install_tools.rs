//! Install-tools command - provision the tool table

use crate::cli::args::InstallToolsArgs;
use crate::cli::commands::{ci_environment, open_cache};
use crate::config::Config;
use crate::error::ToolcribResult;
use crate::fetch::HttpDownloader;
use crate::provision::ProvisioningRunner;
use crate::tool::{InstallContext, ToolTable};
use console::style;
use std::sync::Arc;
use tracing::debug;

/// Execute the install-tools command
pub async fn execute(args: InstallToolsArgs, config: &Config) -> ToolcribResult<()> {
    let ci = ci_environment(config)?;

    let install_dir = args
        .install_dir
        .or_else(|| config.tools.install_dir.clone())
        .unwrap_or_else(|| ci.home_dir.join("lint"));
    let manifest = args.manifest.or_else(|| config.tools.manifest.clone());

    let table = ToolTable::resolve(manifest.as_deref()).await?;
    debug!(
        "Installing {} tool(s) into {}",
        table.tools.len(),
        install_dir.display()
    );

    let context = InstallContext {
        cache: Arc::new(open_cache(config)),
        downloader: Arc::new(HttpDownloader::new()),
        ci,
        java: config.tools.java.clone(),
        go: config.tools.go.clone(),
    };

    let runner = ProvisioningRunner::new(install_dir, context);
    let reports = runner.run(&table).await?;

    for report in &reports {
        println!(
            "{} {} {} {}",
            style("✓").green(),
            report.name,
            report.version,
            style(format!("({})", report.source)).dim()
        );
    }
    println!(
        "Installed {} tool(s) into {}",
        reports.len(),
        runner.install_dir().display()
    );

    Ok(())
}
