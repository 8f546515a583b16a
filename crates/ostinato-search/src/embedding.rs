//! Embedding provider trait and the built-in hashing provider.
//!
//! The retrieval core treats "text → fixed-length vector" as a black box.
//! Whatever provider builds an index must also serve its queries; the
//! provider's [`name`](EmbeddingProvider::name) and dimension are recorded
//! in the index manifest and checked when a query engine is created.
//!
//! # Providers
//!
//! - `HashingEmbeddingProvider`: deterministic bag-of-words feature hashing,
//!   no model files, always available
//! - `FastEmbedProvider`: local transformer models (requires the `fastembed`
//!   feature)

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Trait for generating text embeddings.
///
/// Implementations must be deterministic and return vectors of exactly
/// [`dimension`](Self::dimension) components. Vectors need not be
/// normalized; the builder and the query engine normalize them.
///
/// # Thread Safety
///
/// Implementations are shared across concurrent queries and must handle
/// any internal synchronization themselves.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for a batch of texts, in input order.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The embedding dimension.
    fn dimension(&self) -> usize;

    /// Identifies the model and version; two providers with the same name
    /// must embed into the same space.
    fn name(&self) -> &str;
}

/// Feature-hashing bag-of-words embeddings.
///
/// Each lowercase alphanumeric token is hashed with BLAKE3 into one of
/// `dimension` buckets with a ±1 sign. Texts sharing words land close
/// together; texts with no words in common are orthogonal up to bucket
/// collisions. No model download, fully deterministic across runs and
/// platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
    name: String,
}

impl HashingEmbeddingProvider {
    pub const DEFAULT_DIMENSION: usize = 384;

    /// Create a provider; a zero dimension is raised to one.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            name: format!("hashing-v1-{dimension}"),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(word) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }
        embedding
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Tests
// ============================================================================
