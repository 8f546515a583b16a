//! The metadata side table, keyed by segment id.
//!
//! The retrieval core only ever reads from a store. An absent id is a
//! normal outcome (`Ok(None)`), never an error.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{MetadataRecord, SegmentId};
use crate::schema::Database;

/// Keyed, read-only lookup of segment metadata.
pub trait MetadataStore: Send + Sync + std::fmt::Debug {
    fn get(&self, id: &SegmentId) -> Result<Option<MetadataRecord>>;
}

/// An in-memory metadata table, typically loaded from the metadata CSV.
#[derive(Debug, Default, Clone)]
pub struct MetadataTable {
    records: HashMap<SegmentId, MetadataRecord>,
}

impl MetadataTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from records; a later record replaces an earlier one
    /// with the same id.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Load a table from a metadata CSV file (ComMU column layout).
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let records = read_metadata_csv(std::fs::File::open(path.as_ref())?)?;
        log::debug!(
            "Loaded {} metadata rows from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(Self::from_records(records))
    }

    pub fn insert(&mut self, record: MetadataRecord) {
        if let Some(previous) = self.records.insert(record.id.clone(), record) {
            log::warn!("Duplicate metadata row for {}; keeping the last", previous.id);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetadataStore for MetadataTable {
    fn get(&self, id: &SegmentId) -> Result<Option<MetadataRecord>> {
        Ok(self.records.get(id).cloned())
    }
}

/// Parse metadata rows from CSV with a header line.
///
/// Unknown columns are ignored; the optional ComMU columns may be missing
/// or empty.
pub fn read_metadata_csv<R: Read>(reader: R) -> Result<Vec<MetadataRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, result) in csv_reader.deserialize::<MetadataRecord>().enumerate() {
        let record = result?;
        if record.id.as_str().is_empty() {
            return Err(Error::InvalidData(format!(
                "metadata row {} has an empty id",
                row + 1
            )));
        }
        records.push(record);
    }
    Ok(records)
}

/// A [`MetadataStore`] backed by the imported SQLite table.
///
/// Connections are pooled: each lookup checks one out, so concurrent
/// lookups do not wait on each other. The mutex only guards the idle list.
#[derive(Debug)]
pub struct SqliteMetadataStore {
    path: PathBuf,
    idle: Mutex<Vec<Database>>,
}

impl SqliteMetadataStore {
    /// Idle connections kept for reuse; extra ones are closed on return.
    pub const MAX_IDLE: usize = 8;

    /// Open the database at `path`, applying migrations once.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::open(&path)?;
        Ok(Self {
            path,
            idle: Mutex::new(vec![db]),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn checkout(&self) -> Result<Database> {
        let pooled = self
            .idle
            .lock()
            .map_err(|e| Error::InvalidData(format!("metadata pool lock poisoned: {e}")))?
            .pop();
        match pooled {
            Some(db) => Ok(db),
            None => Database::open(&self.path),
        }
    }

    fn checkin(&self, db: Database) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < Self::MAX_IDLE {
                idle.push(db);
            }
        }
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn get(&self, id: &SegmentId) -> Result<Option<MetadataRecord>> {
        let db = self.checkout()?;
        let found = db.get_segment(id);
        self.checkin(db);
        found
    }
}
