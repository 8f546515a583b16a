//! Standard MIDI File introspection.
//!
//! Reads a file with `midly` and reports its length in seconds, its
//! opening tempo, the General MIDI programs that actually sound, and
//! whether the percussion channel is used.

use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use ostinato_core::{IntrospectionError, MidiInfo, MidiIntrospector};

use crate::gm::{self, DRUM_CHANNEL};

/// Microseconds per quarter note when a file sets no tempo (120 BPM).
const DEFAULT_USPB: u32 = 500_000;

/// [`MidiIntrospector`] backed by `midly`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidiFileIntrospector;

impl MidiFileIntrospector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MidiIntrospector for MidiFileIntrospector {
    fn inspect(&self, path: &Path) -> Result<MidiInfo, IntrospectionError> {
        let bytes = std::fs::read(path).map_err(|e| IntrospectionError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let info = parse_midi(&bytes).map_err(|e| IntrospectionError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::debug!(
            "{}: {:.2}s at {:.1} BPM, {} instruments, drums: {}",
            path.display(),
            info.duration_secs,
            info.tempo_bpm,
            info.instruments.len(),
            info.has_drums
        );
        Ok(info)
    }
}

/// How ticks map to seconds.
enum Clock {
    Metrical {
        ticks_per_beat: f64,
        /// `(tick, microseconds per beat)`, sorted by tick.
        tempos: Vec<(u64, u32)>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl Clock {
    fn seconds_at(&self, tick: u64) -> f64 {
        match self {
            Self::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
            Self::Metrical {
                ticks_per_beat,
                tempos,
            } => {
                let span = |from: u64, to: u64, uspb: u32| {
                    (to - from) as f64 * f64::from(uspb) / 1_000_000.0 / ticks_per_beat
                };
                let mut seconds = 0.0;
                let mut since = 0;
                let mut uspb = DEFAULT_USPB;
                for &(at, tempo) in tempos {
                    if at >= tick {
                        break;
                    }
                    seconds += span(since, at, uspb);
                    since = at;
                    uspb = tempo;
                }
                seconds + span(since, tick, uspb)
            }
        }
    }
}

/// Introspect an in-memory Standard MIDI File.
///
/// All tracks are read as if they play together. Programs are tracked per
/// channel within each track, starting from program 0.
pub fn parse_midi(bytes: &[u8]) -> Result<MidiInfo, midly::Error> {
    let smf = Smf::parse(bytes)?;

    let mut tempos: Vec<(u64, u32)> = Vec::new();
    let mut last_tick: u64 = 0;
    let mut instruments: Vec<String> = Vec::new();
    let mut has_drums = false;

    for track in &smf.tracks {
        let mut tick: u64 = 0;
        let mut programs = [0u8; 16];

        for event in track {
            tick += u64::from(event.delta.as_int());
            match &event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(uspb)) => {
                    tempos.push((tick, uspb.as_int()));
                }
                TrackEventKind::Midi { channel, message } => {
                    last_tick = last_tick.max(tick);
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs[usize::from(channel)] = program.as_int();
                        }
                        MidiMessage::NoteOn { vel, .. } if vel.as_int() > 0 => {
                            if channel == DRUM_CHANNEL {
                                has_drums = true;
                            } else if let Some(name) =
                                gm::program_name(programs[usize::from(channel)])
                            {
                                if !instruments.iter().any(|known| known == name) {
                                    instruments.push(name.to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    tempos.sort_by_key(|&(at, _)| at);
    let opening_uspb = tempos
        .iter()
        .take_while(|&&(at, _)| at == 0)
        .last()
        .map_or(DEFAULT_USPB, |&(_, uspb)| uspb);

    let clock = match smf.header.timing {
        Timing::Metrical(ticks_per_beat) => Clock::Metrical {
            ticks_per_beat: f64::from(ticks_per_beat.as_int().max(1)),
            tempos,
        },
        Timing::Timecode(fps, ticks_per_frame) => Clock::Timecode {
            ticks_per_second: (f64::from(fps.as_f32()) * f64::from(ticks_per_frame)).max(1.0),
        },
    };

    Ok(MidiInfo {
        duration_secs: clock.seconds_at(last_tick),
        tempo_bpm: 60_000_000.0 / f64::from(opening_uspb.max(1)),
        instruments,
        has_drums,
    })
}
