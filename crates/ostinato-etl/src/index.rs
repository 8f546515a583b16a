use std::path::{Path, PathBuf};

use ostinato_core::BuildId;
use ostinato_search::IndexBuilder;
use treadle::{Stage, StageContext, StageOutcome};

use crate::corpus::load_corpus;
use crate::error::IngestResult;

/// What [`build_index`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Built { segments: usize, build_id: BuildId },
    /// The index at the destination already matches the corpus and provider.
    UpToDate { segments: usize },
}

/// Load the corpus at `corpus_path` and (re)build the index at
/// `index_path`, unless it is already fresh and `force` is false.
pub async fn build_index(
    builder: &IndexBuilder,
    corpus_path: &Path,
    index_path: &Path,
    force: bool,
) -> IngestResult<IndexOutcome> {
    let corpus = load_corpus(corpus_path)?;

    if !force && builder.is_fresh(index_path, &corpus) {
        log::info!(
            "Index at {} is up to date ({} segments)",
            index_path.display(),
            corpus.len()
        );
        return Ok(IndexOutcome::UpToDate {
            segments: corpus.len(),
        });
    }

    let index = builder.build_to_path(&corpus, index_path).await?;
    Ok(IndexOutcome::Built {
        segments: index.len(),
        build_id: index.manifest().build_id,
    })
}

/// The Index stage: embed the corpus and persist the similarity index.
#[derive(Debug)]
pub struct IndexStage {
    builder: IndexBuilder,
    corpus_path: PathBuf,
    index_path: PathBuf,
    force: bool,
}

impl IndexStage {
    #[must_use]
    pub fn new(builder: IndexBuilder, corpus_path: PathBuf, index_path: PathBuf, force: bool) -> Self {
        Self {
            builder,
            corpus_path,
            index_path,
            force,
        }
    }
}

#[async_trait::async_trait]
impl Stage for IndexStage {
    fn name(&self) -> &str {
        "index"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Indexing corpus {}", self.corpus_path.display());

        match build_index(&self.builder, &self.corpus_path, &self.index_path, self.force).await {
            Ok(outcome) => {
                log::info!("Index stage finished: {outcome:?}");
                Ok(StageOutcome::Complete)
            }
            Err(e) => Err(treadle::TreadleError::StageExecution(format!(
                "Index build failed: {e}"
            ))),
        }
    }
}
