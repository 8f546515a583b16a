//! Description-embedding retrieval for ostinato.
//!
//! Builds an exact similarity index over segment descriptions once, then
//! answers free-text queries against it, joining each hit back to the
//! metadata table and the segment's MIDI file.
//!
//! ```text
//! corpus ──► EmbeddingProvider ──► IndexBuilder ──► SegmentIndex (one file)
//!                                                     │
//! query ───► EmbeddingProvider ──► QueryEngine ◄──────┘
//!                                     │
//!                                     ├─► MetadataStore
//!                                     └─► MidiIntrospector
//! ```
//!
//! # Features
//!
//! - `fastembed`: local transformer embeddings via the `fastembed` crate

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod artifact;
pub mod builder;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod flat;
pub mod gate;
pub mod vector;

#[cfg(feature = "fastembed")]
pub mod fastembed;

pub use artifact::{IndexManifest, IndexedSegment, SegmentIndex, FORMAT_VERSION};
pub use builder::{corpus_hash, IndexBuilder};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use engine::{
    validate_top_k, MetadataStatus, MidiSource, MidiStatus, QueryEngine, ScoreMode, SearchHit,
    SearchResult,
};
pub use error::{BuildError, EmbeddingError, IndexError, LoadError, QueryError};
pub use flat::{FlatIndex, Neighbor};
pub use gate::EngineGate;

#[cfg(feature = "fastembed")]
pub use crate::fastembed::FastEmbedProvider;
