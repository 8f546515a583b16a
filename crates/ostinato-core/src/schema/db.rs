use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::Result;
use crate::model::{MetadataRecord, SegmentId};

use super::migrations::MIGRATIONS;

const SEGMENT_COLUMNS: &str = "id, genre, instrument, audio_key, tempo_bpm, track_role, partition,
     time_signature, pitch_range, num_measures, min_velocity, max_velocity";

/// Number of imported segments in one dataset partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCount {
    pub partition: String,
    pub segments: u64,
}

/// A database connection holding the imported segment metadata.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Segment metadata
impl Database {
    /// Insert a segment, replacing any existing row with the same id.
    pub fn upsert_segment(&self, record: &MetadataRecord) -> Result<()> {
        upsert(&self.conn, record)?;
        Ok(())
    }

    /// Insert many segments in a single transaction.
    ///
    /// Either every record is written or none is.
    pub fn upsert_segments(&mut self, records: &[MetadataRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for record in records {
            upsert(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Look up one segment by id.
    pub fn get_segment(&self, id: &SegmentId) -> Result<Option<MetadataRecord>> {
        let sql = format!("SELECT {SEGMENT_COLUMNS} FROM segments WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, [id.as_str()], row_to_segment)
            .optional()?;
        Ok(record)
    }

    /// Total number of imported segments.
    pub fn count_segments(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Segment counts grouped by partition, ordered by partition name.
    pub fn partition_counts(&self) -> Result<Vec<PartitionCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT partition, COUNT(*) FROM segments GROUP BY partition ORDER BY partition",
        )?;
        let counts = stmt
            .query_map([], |row| {
                let segments: i64 = row.get(1)?;
                Ok(PartitionCount {
                    partition: row.get(0)?,
                    segments: u64::try_from(segments).unwrap_or(0),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}

fn upsert(conn: &Connection, record: &MetadataRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO segments (
            id, genre, instrument, audio_key, tempo_bpm, track_role, partition,
            time_signature, pitch_range, num_measures, min_velocity, max_velocity,
            imported_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            record.id.as_str(),
            record.genre,
            record.instrument,
            record.key,
            record.tempo_bpm,
            record.track_role,
            record.partition,
            record.time_signature,
            record.pitch_range,
            record.num_measures.map(i64::from),
            record.min_velocity.map(i64::from),
            record.max_velocity.map(i64::from),
            Utc::now().to_rfc3339(),
        ],
    )
}

fn row_to_segment(row: &rusqlite::Row) -> rusqlite::Result<MetadataRecord> {
    let id: String = row.get(0)?;
    Ok(MetadataRecord {
        id: SegmentId::new(id),
        genre: row.get(1)?,
        instrument: row.get(2)?,
        key: row.get(3)?,
        tempo_bpm: row.get(4)?,
        track_role: row.get(5)?,
        partition: row.get(6)?,
        time_signature: row.get(7)?,
        pitch_range: row.get(8)?,
        num_measures: row
            .get::<_, Option<i64>>(9)?
            .and_then(|v| u32::try_from(v).ok()),
        min_velocity: row
            .get::<_, Option<i64>>(10)?
            .and_then(|v| u8::try_from(v).ok()),
        max_velocity: row
            .get::<_, Option<i64>>(11)?
            .and_then(|v| u8::try_from(v).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, partition: &str) -> MetadataRecord {
        let mut record = MetadataRecord::new(id, partition)
            .with_genre("newage")
            .with_instrument("acoustic_piano")
            .with_key("aminor")
            .with_tempo(72.0)
            .with_track_role("main_melody");
        record.num_measures = Some(8);
        record.min_velocity = Some(40);
        record.max_velocity = Some(96);
        record
    }

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_segment_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let record = sample("commu00001", "train");

        db.upsert_segment(&record).unwrap();

        let loaded = db.get_segment(&record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_missing_segment_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_segment(&SegmentId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_segment(&sample("a", "train")).unwrap();
        db.upsert_segment(&sample("a", "val").with_genre("cinematic"))
            .unwrap();

        assert_eq!(db.count_segments().unwrap(), 1);
        let loaded = db.get_segment(&SegmentId::from("a")).unwrap().unwrap();
        assert_eq!(loaded.partition, "val");
        assert_eq!(loaded.genre, "cinematic");
    }

    #[test]
    fn test_bulk_upsert_and_partition_counts() {
        let mut db = Database::open_in_memory().unwrap();
        let records = vec![
            sample("a", "train"),
            sample("b", "train"),
            sample("c", "val"),
        ];

        assert_eq!(db.upsert_segments(&records).unwrap(), 3);
        assert_eq!(db.count_segments().unwrap(), 3);

        let counts = db.partition_counts().unwrap();
        assert_eq!(
            counts,
            vec![
                PartitionCount {
                    partition: "train".to_string(),
                    segments: 2
                },
                PartitionCount {
                    partition: "val".to_string(),
                    segments: 1
                },
            ]
        );
    }

    #[test]
    fn test_reopen_does_not_reapply_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");

        Database::open(&path)
            .unwrap()
            .upsert_segment(&sample("a", "train"))
            .unwrap();
        let db = Database::open(&path).unwrap();

        assert_eq!(db.count_segments().unwrap(), 1);
    }
}
