//! Construct the configured embedding provider.

use std::sync::Arc;

use ostinato_search::{EmbeddingProvider, HashingEmbeddingProvider};

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::error::{IngestError, IngestResult};

/// Build the provider named by `[embedding] provider`.
///
/// Index builds and queries must go through the same configuration;
/// the query engine refuses a provider that differs from the index.
pub fn embedding_provider(config: &EmbeddingConfig) -> IngestResult<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        ProviderKind::Hashing => {
            if config.dimension == 0 {
                return Err(IngestError::Config(
                    "embedding.dimension must be positive".to_string(),
                ));
            }
            Ok(Arc::new(HashingEmbeddingProvider::new(config.dimension)))
        }
        ProviderKind::FastEmbed => fastembed_provider(config),
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_provider(config: &EmbeddingConfig) -> IngestResult<Arc<dyn EmbeddingProvider>> {
    let provider = ostinato_search::FastEmbedProvider::new(&config.model, config.cache_path.clone())
        .map_err(|e| IngestError::Config(e.to_string()))?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_provider(config: &EmbeddingConfig) -> IngestResult<Arc<dyn EmbeddingProvider>> {
    Err(IngestError::Config(format!(
        "embedding provider 'fastembed' (model {}) needs a build with the `fastembed` feature",
        config.model
    )))
}
