//! The MIDI introspection seam.
//!
//! The query engine only needs "path in, [`MidiInfo`] out"; the parser
//! lives elsewhere (`ostinato-etl`) and tests substitute stubs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{MidiInfo, SegmentId};

/// Why a MIDI file could not be introspected.
///
/// Always returned as a value; introspection never panics or aborts a
/// query.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IntrospectionError {
    #[error("cannot read {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("cannot parse {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("introspection of {} timed out", path.display())]
    TimedOut { path: PathBuf },

    #[error("introspection of {} failed: {message}", path.display())]
    Other { path: PathBuf, message: String },
}

/// Extracts [`MidiInfo`] from a MIDI file on disk.
///
/// Implementations must be safe to call from several threads at once.
pub trait MidiIntrospector: Send + Sync + std::fmt::Debug {
    fn inspect(&self, path: &Path) -> Result<MidiInfo, IntrospectionError>;
}

/// Resolves `(segment id, partition)` to the raw MIDI file.
///
/// Files live at `<root>/<partition>/raw/<id>.mid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiLayout {
    root: PathBuf,
}

impl MidiLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the raw MIDI file, or `None` when the partition is blank.
    #[must_use]
    pub fn path_for(&self, id: &SegmentId, partition: &str) -> Option<PathBuf> {
        let partition = partition.trim();
        if partition.is_empty() {
            return None;
        }
        Some(
            self.root
                .join(partition)
                .join("raw")
                .join(format!("{}.mid", id.as_str())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_path_for() {
        let layout = MidiLayout::new("/data/commu_midi");
        let path = layout
            .path_for(&SegmentId::from("commu00012"), "train")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/data/commu_midi/train/raw/commu00012.mid")
        );
    }

    #[test]
    fn test_layout_blank_partition() {
        let layout = MidiLayout::new("/data");
        assert!(layout.path_for(&SegmentId::from("x"), "").is_none());
        assert!(layout.path_for(&SegmentId::from("x"), "   ").is_none());
    }

    #[test]
    fn test_introspection_error_display() {
        let err = IntrospectionError::Malformed {
            path: PathBuf::from("/tmp/a.mid"),
            message: "bad header".to_string(),
        };
        assert_eq!(err.to_string(), "cannot parse /tmp/a.mid: bad header");
    }
}
