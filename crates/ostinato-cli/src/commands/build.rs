use anyhow::{Context, Result};
use ostinato_etl::{build_index, embedding_provider, Config, IndexOutcome};
use ostinato_search::IndexBuilder;
use std::path::PathBuf;

pub async fn run_build(config: &Config, corpus: Option<PathBuf>, force: bool) -> Result<()> {
    let corpus_path = corpus
        .or_else(|| config.corpus_path.clone())
        .context("No corpus given; pass --corpus or set corpus_path in the config")?;

    let provider = embedding_provider(&config.embedding)?;
    println!(
        "\n🔨 Building index with {} ({} dimensions)\n",
        provider.name(),
        provider.dimension()
    );
    println!("  Corpus: {}", corpus_path.display());
    println!("  Index: {}", config.index_path.display());
    println!();

    let builder = IndexBuilder::new(provider).with_batch_size(config.embedding.batch_size);
    let outcome = build_index(&builder, &corpus_path, &config.index_path, force)
        .await
        .context("Index build failed")?;

    match outcome {
        IndexOutcome::Built { segments, build_id } => {
            println!("✓ Indexed {segments} segments (build {build_id})");
        }
        IndexOutcome::UpToDate { segments } => {
            println!("✓ Index is up to date ({segments} segments); use --force to rebuild");
        }
    }

    Ok(())
}
