//! Description corpus loading.
//!
//! The corpus is a CSV with a header row and at least `id` and
//! `description` columns. Any other columns (the description stage copies
//! the whole metadata table through) are ignored. Row order is kept: it
//! becomes the index position order.

use std::io::Read;
use std::path::Path;

use ostinato_core::CorpusEntry;
use serde::Deserialize;

use crate::error::{IngestError, IngestResult};

#[derive(Debug, Deserialize)]
struct CorpusRow {
    id: String,
    description: String,
}

/// Read corpus rows from any reader. `source` names the input in errors.
pub fn read_corpus<R: Read>(reader: R, source: &Path) -> IngestResult<Vec<CorpusEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (index, result) in csv_reader.deserialize::<CorpusRow>().enumerate() {
        let row = result.map_err(|source_err| IngestError::Csv {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        if row.id.is_empty() {
            return Err(IngestError::InvalidRow {
                row: index + 1,
                message: "empty id".to_string(),
            });
        }
        entries.push(CorpusEntry::new(row.id, row.description));
    }
    Ok(entries)
}

/// Load the corpus CSV at `path`.
pub fn load_corpus(path: impl AsRef<Path>) -> IngestResult<Vec<CorpusEntry>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| IngestError::io(path, e))?;
    let entries = read_corpus(file, path)?;
    log::info!("Loaded {} corpus rows from {}", entries.len(), path.display());
    Ok(entries)
}
