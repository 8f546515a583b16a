use anyhow::{Context, Result};
use ostinato_core::schema::Database;
use ostinato_etl::{scan_midi_tree, Config};
use std::path::PathBuf;

pub fn run_scan(config: &Config, root: Option<PathBuf>, check: bool) -> Result<()> {
    let root = root
        .or_else(|| config.midi_root.clone())
        .context("No MIDI root given; pass a path or set midi_root in the config")?;

    log::info!("Starting scan of {}", root.display());
    let summary = scan_midi_tree(&root)?;

    println!("\n📁 {}\n", root.display());
    println!("  MIDI files: {}", summary.files.len());
    for (partition, count) in summary.partition_counts() {
        println!("    {partition}: {count}");
    }
    if summary.skipped > 0 {
        println!("  Skipped (not <split>/raw/<id>.mid): {}", summary.skipped);
    }

    if check {
        let db = Database::open(&config.database_path).context("Failed to open database")?;
        let unmatched = summary.unmatched(&db)?;
        if unmatched.is_empty() {
            println!("\n✓ Every file has a metadata row");
        } else {
            println!("\n  Files without metadata: {}", unmatched.len());
            for entry in unmatched {
                println!("    {}", entry.path.display());
            }
        }
    }

    Ok(())
}
