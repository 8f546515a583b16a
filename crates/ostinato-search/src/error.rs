//! Error types, one enum per failure class.
//!
//! Build and load errors are fatal to their entry point. Query errors
//! reject a single request. Enrichment failures are not errors at all;
//! they travel inside [`crate::SearchResult`].

use std::path::PathBuf;
use std::time::Duration;

use ostinato_core::SegmentId;
use thiserror::Error;

/// The embedding provider could not produce a usable vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("embedding provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("embedding provider {provider} returned {got} vectors for {expected} texts")]
    CountMismatch {
        provider: String,
        expected: usize,
        got: usize,
    },

    #[error("embedding provider {provider} returned a {got}-dimensional vector, expected {expected}")]
    Dimension {
        provider: String,
        expected: usize,
        got: usize,
    },

    #[error("embedding provider {provider} returned a non-finite component")]
    NonFinite { provider: String },

    #[error("embedding timed out after {0:?}")]
    TimedOut(Duration),
}

impl EmbeddingError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Misuse of the flat index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index dimension must be positive")]
    ZeroDimension,

    #[error("vector has dimension {got}, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// The offline build failed; any previously persisted index is untouched.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("corpus row {row} ({id}) has an empty description")]
    EmptyDescription { row: usize, id: SegmentId },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("cannot write index to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A persisted index could not be brought into serving state.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read index {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse index {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("index is inconsistent: {0}")]
    Inconsistent(String),

    #[error(
        "index was built with {index_provider} ({index_dimension}d) but the configured provider is {provider} ({dimension}d)"
    )]
    ProviderMismatch {
        index_provider: String,
        index_dimension: usize,
        provider: String,
        dimension: usize,
    },

    #[error("a query engine is already being served")]
    AlreadyLoaded,
}

/// A query was rejected or could not run.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("top_k must be a positive integer, got {0}")]
    InvalidTopK(i64),

    #[error("index is not loaded yet")]
    NotReady,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}
