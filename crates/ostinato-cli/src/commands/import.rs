use anyhow::{Context, Result};
use ostinato_core::schema::Database;
use ostinato_etl::{import_metadata, Config};
use std::path::PathBuf;

pub fn run_import(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let csv_path = path
        .or_else(|| config.metadata_path.clone())
        .context("No metadata CSV given; pass a path or set metadata_path in the config")?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut db = Database::open(&config.database_path).context("Failed to open database")?;

    let summary = import_metadata(&mut db, &csv_path)?;
    println!(
        "✓ Imported {} rows from {} ({} segments in {})",
        summary.rows,
        csv_path.display(),
        summary.total_segments,
        config.database_path.display()
    );

    Ok(())
}
