use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ids::SegmentId;

/// Musical attributes of a segment, as held by the metadata side table.
///
/// Field aliases accept the column names of the ComMU metadata CSV
/// (`audio_key`, `bpm`, `inst`, `split_data`), so the same type reads the
/// raw table and serializes under the canonical names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: SegmentId,

    pub genre: String,

    #[serde(alias = "inst")]
    pub instrument: String,

    /// Musical key, e.g. `aminor`.
    #[serde(alias = "audio_key")]
    pub key: String,

    #[serde(alias = "bpm")]
    pub tempo_bpm: f64,

    /// Role of the track in the arrangement (`main_melody`, `accompaniment`, ...).
    pub track_role: String,

    /// Dataset partition; locates the raw MIDI file (`train`, `val`, ...).
    #[serde(alias = "split_data")]
    pub partition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_range: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub num_measures: Option<u32>,

    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_velocity: Option<u8>,

    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_velocity: Option<u8>,
}

impl MetadataRecord {
    #[must_use]
    pub fn new(id: impl Into<SegmentId>, partition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            genre: String::new(),
            instrument: String::new(),
            key: String::new(),
            tempo_bpm: 0.0,
            track_role: String::new(),
            partition: partition.into(),
            time_signature: None,
            pitch_range: None,
            num_measures: None,
            min_velocity: None,
            max_velocity: None,
        }
    }

    #[must_use]
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    #[must_use]
    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = instrument.into();
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn with_tempo(mut self, tempo_bpm: f64) -> Self {
        self.tempo_bpm = tempo_bpm;
        self
    }

    #[must_use]
    pub fn with_track_role(mut self, track_role: impl Into<String>) -> Self {
        self.track_role = track_role.into();
        self
    }
}

/// A raw optional-count cell as written by whatever produced the table.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Integer(u64),
    Float(f64),
    Text(String),
}

/// Accept `8` and `8.0` (pandas writes integer columns with gaps as
/// floats). Anything else becomes `None` with a warning, since these
/// columns are supplementary.
#[allow(clippy::float_cmp, clippy::cast_sign_loss)]
fn lenient_count<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let Some(raw) = Option::<RawCount>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let whole = match &raw {
        RawCount::Integer(n) => Some(*n),
        RawCount::Float(f) if *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64 => {
            Some(*f as u64)
        }
        RawCount::Text(text) if text.trim().is_empty() => return Ok(None),
        _ => None,
    };

    let count = whole.and_then(|n| T::try_from(n).ok());
    if count.is_none() {
        log::warn!("Ignoring unusable value {} in an optional metadata column", describe(&raw));
    }
    Ok(count)
}

fn describe(raw: &RawCount) -> String {
    match raw {
        RawCount::Integer(n) => n.to_string(),
        RawCount::Float(f) => f.to_string(),
        RawCount::Text(text) => format!("{text:?}"),
    }
}
