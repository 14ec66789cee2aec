//! Tools command - inspect the tool table

use crate::checksum;
use crate::cli::args::{OutputFormat, ToolsAction, ToolsArgs};
use crate::config::Config;
use crate::error::ToolcribResult;
use crate::tool::{ToolSpec, ToolTable};
use console::style;

/// Execute the tools command
pub async fn execute(args: ToolsArgs, config: &Config) -> ToolcribResult<()> {
    match args.action {
        ToolsAction::List { manifest, format } => {
            let manifest = manifest.or_else(|| config.tools.manifest.clone());
            let table = ToolTable::resolve(manifest.as_deref()).await?;
            match format {
                OutputFormat::Table => print_table(&table.tools)?,
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table.tools)?),
                OutputFormat::Plain => {
                    for tool in &table.tools {
                        println!("{}", tool.name);
                    }
                }
            }
        }
        ToolsAction::Digest { file } => {
            let digest = checksum::digest(&file).await?;
            println!("{}  {}", digest, file.display());
        }
    }

    Ok(())
}

fn print_table(tools: &[ToolSpec]) -> ToolcribResult<()> {
    println!(
        "{:<22} {:<10} {:<11} {:<16}",
        style("NAME").bold(),
        style("VERSION").bold(),
        style("STRATEGY").bold(),
        style("SHA256").bold()
    );
    println!("{}", "-".repeat(62));

    for tool in tools {
        let strategy = tool.acquisition()?.kind();
        println!(
            "{:<22} {:<10} {:<11} {:<16}",
            tool.name,
            tool.version,
            strategy,
            &tool.sha256[..tool.sha256.len().min(12)]
        );
    }

    println!();
    println!("{} tool(s)", tools.len());
    Ok(())
}
