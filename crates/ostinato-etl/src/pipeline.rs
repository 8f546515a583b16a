use treadle::Workflow;

use crate::config::Config;
use crate::provider::embedding_provider;
use crate::{ImportStage, IndexStage};
use ostinato_search::IndexBuilder;

/// Build the import → index pipeline from configuration.
///
/// # Errors
/// Returns an error if no corpus is configured, the embedding provider
/// cannot be created, or the workflow cannot be built.
pub fn build_pipeline(config: &Config, force: bool) -> treadle::Result<Workflow> {
    let corpus_path = config.corpus_path.clone().ok_or_else(|| {
        treadle::TreadleError::InvalidWorkflow("No corpus_path configured".to_string())
    })?;

    let provider = embedding_provider(&config.embedding).map_err(|e| {
        treadle::TreadleError::InvalidWorkflow(format!("Failed to create embedding provider: {e}"))
    })?;
    let builder = IndexBuilder::new(provider).with_batch_size(config.embedding.batch_size);

    let import_stage = ImportStage::new(config.metadata_path.clone(), config.database_path.clone());
    let index_stage = IndexStage::new(builder, corpus_path, config.index_path.clone(), force);

    Workflow::builder()
        .stage("import", import_stage)
        .stage("index", index_stage)
        .dependency("index", "import")
        .build()
}
