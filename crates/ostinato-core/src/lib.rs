//! Core domain model for ostinato.
//!
//! This crate defines the segment model (corpus entries, metadata records,
//! MIDI facts), the two enrichment seams the query engine joins against
//! ([`MetadataStore`] and [`MidiIntrospector`]), and the SQLite schema that
//! backs the imported metadata table.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod introspect;
pub mod model;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use introspect::{IntrospectionError, MidiIntrospector, MidiLayout};
pub use model::{BuildId, CorpusEntry, MetadataRecord, MidiInfo, SegmentId};
pub use store::{read_metadata_csv, MetadataStore, MetadataTable, SqliteMetadataStore};
