use serde::{Deserialize, Serialize};

/// Facts read from a Standard MIDI File.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiInfo {
    /// Time of the last channel event, in seconds.
    pub duration_secs: f64,

    /// Tempo in force at the start of the file.
    pub tempo_bpm: f64,

    /// General MIDI program names of the pitched parts, in order of first
    /// appearance. Each name appears once, unlike a per-track listing where
    /// two piano tracks would give "Acoustic Grand Piano" twice.
    pub instruments: Vec<String>,

    /// Whether any notes sound on the percussion channel.
    pub has_drums: bool,
}

impl MidiInfo {
    /// Tempo assumed by the MIDI standard when a file sets none.
    pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
}
