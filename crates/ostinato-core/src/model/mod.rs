pub mod corpus;
pub mod ids;
pub mod metadata;
pub mod midi;

pub use corpus::CorpusEntry;
pub use ids::{BuildId, SegmentId};
pub use metadata::MetadataRecord;
pub use midi::MidiInfo;
