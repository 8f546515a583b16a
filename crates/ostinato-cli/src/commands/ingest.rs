use anyhow::{Context, Result};
use ostinato_etl::{build_pipeline, Config, IngestJob};

/// Run the import → index pipeline.
///
/// Steps:
/// 1. Import - load the metadata CSV into the database
/// 2. Index - embed the description corpus and persist the index
pub async fn run_ingest(config: &Config, force: bool) -> Result<()> {
    let corpus_path = config
        .corpus_path
        .clone()
        .context("No corpus_path configured; run `ostinato config set corpus_path <csv>`")?;

    println!("\n🎵 Ostinato Ingest Pipeline\n");
    println!("  Corpus: {}", corpus_path.display());
    if let Some(metadata_path) = &config.metadata_path {
        println!("  Metadata: {}", metadata_path.display());
    }
    println!("  Database: {}", config.database_path.display());
    println!("  Index: {}", config.index_path.display());
    println!();

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let workflow = build_pipeline(config, force).context("Failed to build pipeline")?;

    let mut store = treadle::SqliteStateStore::open(&config.pipeline_state_path())
        .await
        .context("Failed to open pipeline state store")?;

    let job = IngestJob::fresh(corpus_path);
    log::debug!("Starting {job}");

    // Subscribe to events for progress display
    let mut events = workflow.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                treadle::WorkflowEvent::StageStarted { stage, .. } => {
                    println!("  ⏳ [{stage}] Starting...");
                }
                treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                    println!("  ✓ [{stage}] Complete");
                }
                treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                    eprintln!("  ✗ [{stage}] FAILED: {error}");
                }
                _ => {}
            }
        }
    });

    workflow
        .advance(&job, &mut store)
        .await
        .context("Pipeline execution failed")?;

    println!("\n✓ Ingest complete");
    println!("\nNext steps:");
    println!("  - Run 'ostinato search \"<description>\"' to query the index");
    println!("  - Run 'ostinato status' to see what was loaded");

    Ok(())
}
