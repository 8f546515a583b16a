use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use ostinato_core::schema::Database;
use ostinato_core::SegmentId;
use walkdir::WalkDir;

use crate::error::{IngestError, IngestResult};

/// A MIDI file found where the layout expects one:
/// `<root>/<partition>/raw/<id>.mid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFileEntry {
    pub id: SegmentId,
    pub partition: String,
    pub path: PathBuf,
}

/// Result of walking a MIDI tree.
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub files: Vec<MidiFileEntry>,
    /// Files that are not MIDI or sit outside the layout.
    pub skipped: usize,
}

impl ScanSummary {
    /// Number of laid-out MIDI files per partition.
    #[must_use]
    pub fn partition_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.files {
            *counts.entry(file.partition.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Files whose id has no row in the metadata database, or whose row
    /// names a different partition.
    pub fn unmatched<'a>(&'a self, db: &Database) -> IngestResult<Vec<&'a MidiFileEntry>> {
        let mut unmatched = Vec::new();
        for file in &self.files {
            match db.get_segment(&file.id)? {
                Some(record) if record.partition == file.partition => {}
                _ => unmatched.push(file),
            }
        }
        Ok(unmatched)
    }
}

fn is_midi_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        matches!(
            ext.to_string_lossy().to_lowercase().as_ref(),
            "mid" | "midi"
        )
    })
}

/// Split `<partition>/raw/<id>.mid` (relative to the root) into its parts.
fn classify(root: &Path, path: &Path) -> Option<MidiFileEntry> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [partition, "raw", _file] => Some(MidiFileEntry {
            id: SegmentId::new(path.file_stem()?.to_str()?),
            partition: (*partition).to_string(),
            path: path.to_path_buf(),
        }),
        _ => None,
    }
}

/// Walk the MIDI tree under `root`, collecting every file that follows the
/// partition layout.
pub fn scan_midi_tree(root: impl AsRef<Path>) -> IngestResult<ScanSummary> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(IngestError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    log::info!("Scanning MIDI tree at {}", root.display());
    let mut summary = ScanSummary::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        match is_midi_file(path).then(|| classify(root, path)).flatten() {
            Some(file) => {
                log::debug!("Found {} ({})", file.id, file.partition);
                summary.files.push(file);
            }
            None => {
                log::debug!("Skipping {}", path.display());
                summary.skipped += 1;
            }
        }
    }

    log::info!(
        "Scan complete: {} MIDI files, {} skipped",
        summary.files.len(),
        summary.skipped
    );
    Ok(summary)
}
