//! The persisted index: one self-describing file per build.
//!
//! Every entry carries its id, its description, and its vector together,
//! so positions in the similarity index and rows of the id/description
//! tables can never drift apart. The manifest records the provider that
//! produced the vectors and a hash of the corpus they were built from.
//!
//! Writes go to a temporary file in the destination directory which is
//! then renamed over the target; readers see either the previous build or
//! the new one, never a partial file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ostinato_core::{BuildId, SegmentId};
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, IndexError, LoadError};
use crate::flat::{FlatIndex, Neighbor};

/// On-disk layout version; bumped on any incompatible change.
pub const FORMAT_VERSION: u32 = 1;

/// Describes one index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub build_id: BuildId,
    pub built_at: DateTime<Utc>,
    /// [`EmbeddingProvider::name`](crate::EmbeddingProvider::name) of the
    /// provider that embedded the corpus.
    pub provider: String,
    pub dimension: usize,
    pub entry_count: usize,
    /// BLAKE3 over the corpus ids and descriptions, in order.
    pub corpus_hash: String,
}

/// A borrowed view of one indexed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedSegment<'a> {
    pub position: usize,
    pub id: &'a SegmentId,
    pub description: &'a str,
}

#[derive(Serialize)]
struct StoredIndexRef<'a> {
    manifest: &'a IndexManifest,
    entries: Vec<StoredEntryRef<'a>>,
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    id: &'a SegmentId,
    description: &'a str,
    vector: &'a [f32],
}

#[derive(Deserialize)]
struct StoredIndex {
    manifest: IndexManifest,
    entries: Vec<StoredEntry>,
}

#[derive(Deserialize)]
struct StoredEntry {
    id: SegmentId,
    description: String,
    vector: Vec<f32>,
}

#[derive(Deserialize)]
struct ManifestOnly {
    manifest: IndexManifest,
}

/// A built, immutable segment index ready to serve queries.
///
/// Position `i` of the similarity index, `ids[i]`, and `descriptions[i]`
/// always describe the same segment.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    manifest: IndexManifest,
    index: FlatIndex,
    ids: Vec<SegmentId>,
    descriptions: Vec<String>,
}

impl SegmentIndex {
    /// Assemble an index from aligned parts. Only the builder and the
    /// loader create indexes, and both check alignment first.
    pub(crate) fn assemble(
        manifest: IndexManifest,
        index: FlatIndex,
        ids: Vec<SegmentId>,
        descriptions: Vec<String>,
    ) -> Self {
        debug_assert_eq!(index.len(), ids.len());
        debug_assert_eq!(ids.len(), descriptions.len());
        Self {
            manifest,
            index,
            ids,
            descriptions,
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[must_use]
    pub fn entry(&self, position: usize) -> Option<IndexedSegment<'_>> {
        Some(IndexedSegment {
            position,
            id: self.ids.get(position)?,
            description: self.descriptions.get(position)?,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = IndexedSegment<'_>> {
        self.ids
            .iter()
            .zip(&self.descriptions)
            .enumerate()
            .map(|(position, (id, description))| IndexedSegment {
                position,
                id,
                description,
            })
    }

    /// The stored (normalized) vector at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.index.vector(position)
    }

    /// Nearest neighbours of an already-normalized query vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.index.search(query, k)
    }

    /// Persist atomically to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BuildError> {
        let path = path.as_ref();
        let persist_err = |source: std::io::Error| BuildError::Persist {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(persist_err)?;

        let stored = StoredIndexRef {
            manifest: &self.manifest,
            entries: self
                .ids
                .iter()
                .zip(&self.descriptions)
                .enumerate()
                .map(|(position, (id, description))| StoredEntryRef {
                    id,
                    description,
                    vector: self.index.vector(position).unwrap_or_default(),
                })
                .collect(),
        };

        let tmp = tempfile::Builder::new()
            .prefix(".ostinato-index-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(persist_err)?;

        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &stored)?;
            writer.flush().map_err(persist_err)?;
        }
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(path).map_err(|e| persist_err(e.error))?;

        log::info!(
            "Saved index {} ({} segments) to {}",
            self.manifest.build_id,
            self.len(),
            path.display()
        );
        Ok(())
    }

    /// Load and validate a persisted index.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let stored: StoredIndex = read_json(path)?;
        let StoredIndex { manifest, entries } = stored;

        check_version(&manifest)?;
        if manifest.dimension == 0 {
            return Err(LoadError::Inconsistent(
                "manifest dimension is zero".to_string(),
            ));
        }
        if entries.is_empty() {
            return Err(LoadError::Inconsistent("index has no entries".to_string()));
        }
        if entries.len() != manifest.entry_count {
            return Err(LoadError::Inconsistent(format!(
                "manifest lists {} entries, file holds {}",
                manifest.entry_count,
                entries.len()
            )));
        }

        let mut index = FlatIndex::with_capacity(manifest.dimension, entries.len())
            .map_err(|e| LoadError::Inconsistent(e.to_string()))?;
        let mut ids = Vec::with_capacity(entries.len());
        let mut descriptions = Vec::with_capacity(entries.len());

        for (position, entry) in entries.into_iter().enumerate() {
            index.add(&entry.vector).map_err(|e| {
                LoadError::Inconsistent(format!("entry {position} ({}): {e}", entry.id))
            })?;
            ids.push(entry.id);
            descriptions.push(entry.description);
        }

        log::debug!(
            "Loaded index {} ({} segments, {}d, provider {}) from {}",
            manifest.build_id,
            ids.len(),
            manifest.dimension,
            manifest.provider,
            path.display()
        );

        Ok(Self::assemble(manifest, index, ids, descriptions))
    }

    /// Read only the manifest of a persisted index.
    pub fn read_manifest(path: impl AsRef<Path>) -> Result<IndexManifest, LoadError> {
        let path = path.as_ref();
        let only: ManifestOnly = read_json(path)?;
        check_version(&only.manifest)?;
        Ok(only.manifest)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn check_version(manifest: &IndexManifest) -> Result<(), LoadError> {
    if manifest.format_version == FORMAT_VERSION {
        Ok(())
    } else {
        Err(LoadError::Inconsistent(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            manifest.format_version
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> SegmentIndex {
        let mut index = FlatIndex::new(2).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            build_id: BuildId::new(),
            built_at: Utc::now(),
            provider: "test-2".to_string(),
            dimension: 2,
            entry_count: 2,
            corpus_hash: "abc".to_string(),
        };
        SegmentIndex::assemble(
            manifest,
            index,
            vec![SegmentId::from("a"), SegmentId::from("b")],
            vec!["first".to_string(), "second".to_string()],
        )
    }

    #[test]
    fn test_entries_are_aligned() {
        let index = sample_index();
        let entry = index.entry(1).unwrap();
        assert_eq!(entry.id.as_str(), "b");
        assert_eq!(entry.description, "second");
        assert_eq!(index.vector(1), Some(&[0.0, 1.0][..]));
        assert!(index.entry(2).is_none());

        let ids: Vec<&str> = index.entries().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("segments.index.json");
        let index = sample_index();

        index.save(&path).unwrap();
        let loaded = SegmentIndex::load(&path).unwrap();

        assert_eq!(loaded.manifest(), index.manifest());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entry(0).unwrap().description, "first");
        assert_eq!(loaded.vector(0), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        sample_index().save(&path).unwrap();
        sample_index().save(&path).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_read_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        let index = sample_index();
        index.save(&path).unwrap();

        let manifest = SegmentIndex::read_manifest(&path).unwrap();
        assert_eq!(manifest.build_id, index.manifest().build_id);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SegmentIndex::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_load_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = SegmentIndex::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    fn rewrite(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        edit(&mut value);
        std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_load_rejects_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        sample_index().save(&path).unwrap();
        rewrite(&path, |v| v["manifest"]["entry_count"] = 3.into());

        let err = SegmentIndex::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Inconsistent(_)));
    }

    #[test]
    fn test_load_rejects_wrong_vector_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        sample_index().save(&path).unwrap();
        rewrite(&path, |v| {
            v["entries"][1]["vector"] = serde_json::json!([0.0, 1.0, 0.0]);
        });

        let err = SegmentIndex::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Inconsistent(_)));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        sample_index().save(&path).unwrap();
        rewrite(&path, |v| v["manifest"]["format_version"] = 99.into());

        assert!(SegmentIndex::load(&path).is_err());
        assert!(SegmentIndex::read_manifest(&path).is_err());
    }
}
