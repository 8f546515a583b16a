//! Error types for loading inputs and running ingest stages.

use std::path::PathBuf;

use ostinato_search::BuildError;
use thiserror::Error;

/// Errors raised while reading corpus/metadata inputs or building an index.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An input file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A corpus CSV is malformed or lacks a required column.
    #[error("cannot parse corpus {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A corpus row is structurally valid CSV but unusable.
    #[error("corpus row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    /// An error propagated from the core domain layer.
    #[error(transparent)]
    Core(#[from] ostinato_core::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// The configuration asks for something this build cannot do.
    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Wrap an I/O error with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for ingest results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
