//! Offline index construction.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ostinato_core::{BuildId, CorpusEntry, SegmentId};

use crate::artifact::{IndexManifest, SegmentIndex, FORMAT_VERSION};
use crate::embedding::EmbeddingProvider;
use crate::error::{BuildError, EmbeddingError};
use crate::flat::FlatIndex;
use crate::vector::l2_normalize;

/// Builds a [`SegmentIndex`] from corpus rows.
///
/// Descriptions are embedded in batches, normalized to unit length, and
/// added in corpus order, so position `i` is always corpus row `i`.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl IndexBuilder {
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the embedding batch size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed every corpus row and assemble the index in memory.
    ///
    /// Fails without side effects on an empty corpus, a blank description,
    /// or any embedding failure. Duplicate ids are indexed at every
    /// position they occur and logged.
    pub async fn build(&self, corpus: &[CorpusEntry]) -> Result<SegmentIndex, BuildError> {
        if corpus.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }
        validate_corpus(corpus)?;

        let started = Instant::now();
        let provider = self.provider.as_ref();
        let dimension = provider.dimension();
        log::info!(
            "Embedding {} descriptions with {} ({}d, batch {})",
            corpus.len(),
            provider.name(),
            dimension,
            self.batch_size
        );

        let mut index = FlatIndex::with_capacity(dimension, corpus.len())?;
        for (batch_no, batch) in corpus.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|e| e.description.as_str()).collect();
            let vectors = provider.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(EmbeddingError::CountMismatch {
                    provider: provider.name().to_string(),
                    expected: texts.len(),
                    got: vectors.len(),
                }
                .into());
            }

            for (entry, mut vector) in batch.iter().zip(vectors) {
                check_vector(provider, &vector)?;
                if !l2_normalize(&mut vector) {
                    log::warn!("Description of {} embeds to a zero vector", entry.id);
                }
                index.add(&vector)?;
            }
            log::debug!("Embedded batch {} ({} rows)", batch_no + 1, batch.len());
        }

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            build_id: BuildId::new(),
            built_at: Utc::now(),
            provider: provider.name().to_string(),
            dimension,
            entry_count: corpus.len(),
            corpus_hash: corpus_hash(corpus),
        };
        let ids = corpus.iter().map(|e| e.id.clone()).collect();
        let descriptions = corpus.iter().map(|e| e.description.clone()).collect();

        log::info!(
            "Built index {} with {} segments in {:.2?}",
            manifest.build_id,
            corpus.len(),
            started.elapsed()
        );
        Ok(SegmentIndex::assemble(manifest, index, ids, descriptions))
    }

    /// Build and persist atomically. On failure the file at `path` is left
    /// as it was.
    pub async fn build_to_path(
        &self,
        corpus: &[CorpusEntry],
        path: impl AsRef<Path>,
    ) -> Result<SegmentIndex, BuildError> {
        let index = self.build(corpus).await?;
        index.save(path)?;
        Ok(index)
    }

    /// Whether the index at `path` was built from exactly this corpus with
    /// this builder's provider. Any read failure counts as stale.
    pub fn is_fresh(&self, path: impl AsRef<Path>, corpus: &[CorpusEntry]) -> bool {
        match SegmentIndex::read_manifest(path.as_ref()) {
            Ok(manifest) => {
                manifest.provider == self.provider.name()
                    && manifest.dimension == self.provider.dimension()
                    && manifest.entry_count == corpus.len()
                    && manifest.corpus_hash == corpus_hash(corpus)
            }
            Err(e) => {
                log::debug!("Index at {} is stale: {e}", path.as_ref().display());
                false
            }
        }
    }
}

fn validate_corpus(corpus: &[CorpusEntry]) -> Result<(), BuildError> {
    let mut seen: HashSet<&SegmentId> = HashSet::with_capacity(corpus.len());
    for (row, entry) in corpus.iter().enumerate() {
        if entry.description.trim().is_empty() {
            return Err(BuildError::EmptyDescription {
                row: row + 1,
                id: entry.id.clone(),
            });
        }
        if !seen.insert(&entry.id) {
            log::warn!("Segment {} appears more than once in the corpus", entry.id);
        }
    }
    Ok(())
}

fn check_vector(provider: &dyn EmbeddingProvider, vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.len() != provider.dimension() {
        return Err(EmbeddingError::Dimension {
            provider: provider.name().to_string(),
            expected: provider.dimension(),
            got: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFinite {
            provider: provider.name().to_string(),
        });
    }
    Ok(())
}

/// Content hash of a corpus: BLAKE3 over each id and description, in order.
pub fn corpus_hash(corpus: &[CorpusEntry]) -> String {
    let mut hasher = blake3::Hasher::new();
    for entry in corpus {
        hasher.update(entry.id.as_str().as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(entry.description.as_bytes());
        hasher.update(&[0x1e]);
    }
    hasher.finalize().to_hex().to_string()
}
