use anyhow::Result;
use ostinato_core::schema::Database;
use ostinato_etl::Config;
use ostinato_search::SegmentIndex;

pub fn show_status(config: &Config) -> Result<()> {
    println!("\n📊 Ostinato Status\n");

    println!("  Database: {}", config.database_path.display());
    if config.database_path.exists() {
        let db = Database::open(&config.database_path)?;
        println!("  Segments: {}", db.count_segments()?);
        for count in db.partition_counts()? {
            println!("    {}: {}", count.partition, count.segments);
        }
    } else {
        println!("  (not created; run `ostinato import`)");
    }

    println!("\n  Index: {}", config.index_path.display());
    if config.index_path.exists() {
        match SegmentIndex::read_manifest(&config.index_path) {
            Ok(manifest) => {
                println!("  Entries: {}", manifest.entry_count);
                println!("  Provider: {} ({} dimensions)", manifest.provider, manifest.dimension);
                println!("  Built: {}", manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
                println!("  Build: {}", manifest.build_id);
            }
            Err(e) => println!("  Unreadable: {e}"),
        }
    } else {
        println!("  (not built; run `ostinato build`)");
    }

    Ok(())
}
