use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use treadle::WorkItem;

/// One ingest run flowing through the import → index stages.
///
/// Each run gets a fresh id so the state store does not treat a re-run
/// as already complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    id: String,
    /// Corpus the run indexes.
    pub corpus_path: PathBuf,
}

impl IngestJob {
    #[must_use]
    pub fn new(id: impl Into<String>, corpus_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            corpus_path,
        }
    }

    /// A job with a unique `ingest-<uuid>` id.
    #[must_use]
    pub fn fresh(corpus_path: PathBuf) -> Self {
        Self::new(format!("ingest-{}", uuid::Uuid::new_v4()), corpus_path)
    }
}

impl WorkItem for IngestJob {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for IngestJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.corpus_path.display())
    }
}
