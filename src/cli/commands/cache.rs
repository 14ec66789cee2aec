//! Cache command - manage the blob cache

use crate::cache::{CacheEntry, LocalBlobCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::open_cache;
use crate::config::Config;
use crate::error::ToolcribResult;
use chrono::{Duration, Utc};
use console::style;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ToolcribResult<()> {
    let cache = open_cache(config);
    debug!("Cache root: {}", cache.root().display());

    match args.action {
        CacheAction::List { format } => list_entries(&cache, format).await,
        CacheAction::Gc { days, dry_run } => gc_entries(&cache, config, days, dry_run).await,
    }
}

/// List committed cache entries
async fn list_entries(cache: &LocalBlobCache, format: OutputFormat) -> ToolcribResult<()> {
    let entries = cache.entries().await?;

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cache entries found."),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!(
        "{:<60} {:<10} {:<20}",
        style("KEY").bold(),
        style("SIZE").bold(),
        style("CREATED").bold()
    );
    println!("{}", "-".repeat(90));

    for entry in entries {
        let created = entry.created_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<60} {:<10} {:<20}",
            truncate(&entry.key, 60),
            format_bytes(entry.size_bytes),
            created
        );
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!();
    println!("Total: {} entr(ies), {}", entries.len(), format_bytes(total));
}

/// Garbage collect old entries
async fn gc_entries(
    cache: &LocalBlobCache,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> ToolcribResult<()> {
    let gc_days = days_override.unwrap_or(config.cache.gc_days);

    if gc_days == 0 {
        println!("Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let cutoff = Utc::now() - Duration::days(i64::from(gc_days));
    let removed = cache.prune(cutoff, dry_run).await?;

    if removed.is_empty() {
        println!("No cache entries older than {} days.", gc_days);
        return Ok(());
    }

    for entry in &removed {
        let age_days = (Utc::now() - entry.created_at).num_days();
        println!(
            "  {} {} ({} days old)",
            style("•").red(),
            entry.key,
            age_days
        );
    }

    if dry_run {
        println!();
        println!("Dry run - {} entr(ies) would be removed.", removed.len());
    } else {
        println!("{} removed {} entr(ies)", style("✓").green(), removed.len());
    }

    Ok(())
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn truncate(key: &str, width: usize) -> String {
    if key.chars().count() <= width {
        key.to_string()
    } else {
        let head: String = key.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
