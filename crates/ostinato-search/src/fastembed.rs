//! Local transformer embeddings via the `fastembed` crate.
//!
//! `fastembed::TextEmbedding` is neither `Send` nor `Sync` across calls, so
//! the model lives behind `Arc<Mutex<_>>` and every call runs on
//! `tokio::task::spawn_blocking`.
//!
//! Requires the `fastembed` feature.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::EmbeddingError;

/// Model used when none is configured: the sentence-transformers MiniLM
/// the description corpus was tuned against.
pub const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

fn resolve_model(name: &str) -> Result<::fastembed::EmbeddingModel, EmbeddingError> {
    use ::fastembed::EmbeddingModel;

    match name {
        "all-minilm-l6-v2" | "AllMiniLML6V2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "bge-small-en-v1.5" | "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" | "BGELargeENV15" => Ok(EmbeddingModel::BGELargeENV15),
        other => Err(EmbeddingError::provider(
            "fastembed",
            format!(
                "unknown embedding model '{other}'; supported: all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5"
            ),
        )),
    }
}

/// Embeddings from a locally cached transformer model.
///
/// | Name | Dimension |
/// |------|-----------|
/// | `all-minilm-l6-v2` | 384 |
/// | `bge-small-en-v1.5` | 384 |
/// | `bge-base-en-v1.5` | 768 |
/// | `bge-large-en-v1.5` | 1024 |
pub struct FastEmbedProvider {
    model: Arc<Mutex<::fastembed::TextEmbedding>>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedProvider {
    /// Load `model_name`, downloading it into `cache_dir` on first use.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self, EmbeddingError> {
        let mut init = ::fastembed::InitOptions::new(resolve_model(model_name)?);
        if let Some(dir) = cache_dir {
            init = init.with_cache_dir(dir);
        }

        let mut text_embedding = ::fastembed::TextEmbedding::try_new(init).map_err(|e| {
            EmbeddingError::provider(model_name, format!("cannot initialize model: {e}"))
        })?;

        let probe = text_embedding
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbeddingError::provider(model_name, format!("probe failed: {e}")))?;
        let dimension = probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| EmbeddingError::provider(model_name, "empty probe embedding"))?;

        log::info!("Loaded embedding model {model_name} ({dimension}d)");
        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            dimension,
            model_name: model_name.to_string(),
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        let name = self.model_name.clone();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| EmbeddingError::provider(&name, format!("model lock poisoned: {e}")))?;
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::provider(&name, e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::provider(&self.model_name, format!("embedding task failed: {e}")))?
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::provider(&self.model_name, "no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.run(texts.iter().map(|t| (*t).to_string()).collect())
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}
