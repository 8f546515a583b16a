//! Ingest side of ostinato.
//!
//! Configuration, corpus and metadata loading, MIDI file introspection,
//! and the import and index stages as treadle `Stage` implementations.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod gm;
pub mod import;
pub mod index;
pub mod midi;
pub mod pipeline;
pub mod provider;
pub mod scan;
pub mod work_item;

pub use config::{Config, EmbeddingConfig, LoggingConfig, ProviderKind, QueryConfig};
pub use corpus::{load_corpus, read_corpus};
pub use error::{IngestError, IngestResult};
pub use import::{import_metadata, ImportStage, ImportSummary};
pub use index::{build_index, IndexOutcome, IndexStage};
pub use midi::{parse_midi, MidiFileIntrospector};
pub use pipeline::build_pipeline;
pub use provider::embedding_provider;
pub use scan::{scan_midi_tree, MidiFileEntry, ScanSummary};
pub use work_item::IngestJob;
