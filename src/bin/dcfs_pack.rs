use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dcfs::index::{CatalogEntry, CatalogIndex};
use dcfs::storage::CatalogStore;
use tracing_subscriber::EnvFilter;

/// Build a dcfs catalog from a JSON list of entries
///
/// Each entry: {"ext", "type", "site", "directory", "duration", "intervals": [[start, end], ...]}
#[derive(Debug, Parser)]
#[command(name = "dcfs-pack", version, about)]
struct Cli {
    /// JSON input (array of entries)
    input: PathBuf,
    /// Catalog file to write (replaced atomically)
    catalog: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("read {}", cli.input.display()))?;
    let entries: Vec<CatalogEntry> =
        serde_json::from_str(&text).with_context(|| format!("parse {}", cli.input.display()))?;

    for e in &entries {
        anyhow::ensure!(
            e.duration > 0,
            "{}: duration must be positive, got {}",
            e.directory,
            e.duration
        );
        if let Some(&(s, t)) = e.intervals.iter().find(|(s, t)| s > t) {
            anyhow::bail!("{}: interval [{}, {}) has start after end", e.directory, s, t);
        }
    }

    let index = CatalogIndex::from_entries(entries);
    CatalogStore::new(cli.catalog).write_atomic(&index)?;
    Ok(())
}
