//! Metadata import: ComMU metadata CSV into the SQLite database.

use std::path::{Path, PathBuf};

use ostinato_core::read_metadata_csv;
use ostinato_core::schema::Database;
use treadle::{Stage, StageContext, StageOutcome};

use crate::error::{IngestError, IngestResult};

/// Outcome of one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows read from the CSV.
    pub rows: usize,
    /// Segments in the database afterwards.
    pub total_segments: u64,
}

/// Upsert every metadata row from `csv_path` into `db` in one transaction.
///
/// Re-importing the same file is a no-op apart from refreshed timestamps.
pub fn import_metadata(db: &mut Database, csv_path: impl AsRef<Path>) -> IngestResult<ImportSummary> {
    let csv_path = csv_path.as_ref();
    let file = std::fs::File::open(csv_path).map_err(|e| IngestError::io(csv_path, e))?;
    let records = read_metadata_csv(file)?;

    let rows = db.upsert_segments(&records)?;
    let total_segments = db.count_segments()?;
    log::info!(
        "Imported {} metadata rows from {} ({} segments total)",
        rows,
        csv_path.display(),
        total_segments
    );

    Ok(ImportSummary {
        rows,
        total_segments,
    })
}

/// The Import stage: load the metadata CSV into the database.
///
/// Without a metadata path the stage completes without doing anything;
/// queries then run without the metadata join.
#[derive(Debug)]
pub struct ImportStage {
    metadata_path: Option<PathBuf>,
    db_path: PathBuf,
}

impl ImportStage {
    #[must_use]
    pub fn new(metadata_path: Option<PathBuf>, db_path: PathBuf) -> Self {
        Self {
            metadata_path,
            db_path,
        }
    }
}

#[async_trait::async_trait]
impl Stage for ImportStage {
    fn name(&self) -> &str {
        "import"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        let Some(metadata_path) = &self.metadata_path else {
            log::warn!("No metadata_path configured; skipping metadata import");
            return Ok(StageOutcome::Complete);
        };

        let mut db = Database::open(&self.db_path).map_err(|e| {
            treadle::TreadleError::StageExecution(format!("Failed to open database: {e}"))
        })?;

        match import_metadata(&mut db, metadata_path) {
            Ok(_) => Ok(StageOutcome::Complete),
            Err(e) => Err(treadle::TreadleError::StageExecution(format!(
                "Import failed: {e}"
            ))),
        }
    }
}
