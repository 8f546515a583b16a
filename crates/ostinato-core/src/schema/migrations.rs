/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Segment metadata (one row per corpus segment id)
CREATE TABLE IF NOT EXISTS segments (
    id TEXT PRIMARY KEY,
    genre TEXT NOT NULL,
    instrument TEXT NOT NULL,
    audio_key TEXT NOT NULL,
    tempo_bpm REAL NOT NULL,
    track_role TEXT NOT NULL,
    partition TEXT NOT NULL,
    time_signature TEXT,
    pitch_range TEXT,
    num_measures INTEGER,
    min_velocity INTEGER,
    max_velocity INTEGER,
    imported_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_segments_partition ON segments(partition);
CREATE INDEX IF NOT EXISTS idx_segments_genre ON segments(genre);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "segment_metadata",
    sql: MIGRATION_001,
}];
