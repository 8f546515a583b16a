use serde::{Deserialize, Serialize};

use crate::model::ids::SegmentId;

/// One row of the description corpus: a segment id and the text that
/// describes it.
///
/// Produced by an upstream description stage and never modified here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub id: SegmentId,
    pub description: String,
}

impl CorpusEntry {
    #[must_use]
    pub fn new(id: impl Into<SegmentId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_entry_new() {
        let entry = CorpusEntry::new("a", "calm piano ballad");
        assert_eq!(entry.id.as_str(), "a");
        assert_eq!(entry.description, "calm piano ballad");
    }
}
