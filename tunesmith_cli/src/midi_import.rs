// Standard MIDI File import.
//
// Turns a metrical SMF into a `TraditionalRequest`. Every note-on with a
// non-zero velocity becomes one note:
// - time: the absolute tick divided by the file's ticks per quarter note,
//   kept as an exact `BeatTime`;
// - pitch row: the key's distance above the lowest key in the file, offset
//   by `lowest_row`;
// - instrument: the channel, taken modulo the instrument list.
// Notes are numbered in (time, track, key) order. The tempo is the file's
// first tempo event unless overridden, and 120 bpm when there is none.
//
// Uses the `midly` crate for parsing.

use crate::error::{CliError, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, info};
use tunesmith_core::{BeatTime, EntityKind, LevelBounds, NoteTarget, ScrollPreference, TraditionalRequest};

const DEFAULT_TEMPO_BPM: f64 = 120.0;

#[derive(Clone, Debug)]
pub struct ImportOptions {
    pub tempo_override: Option<f64>,
    pub level: LevelBounds,
    pub lowest_row: i32,
}

/// A note-on before pitch rows are assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RawNote {
    tick: u64,
    track: usize,
    key: u8,
    channel: u8,
}

pub fn import(bytes: &[u8], options: &ImportOptions) -> Result<TraditionalRequest> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpq) => u32::from(tpq.as_int()).max(1),
        Timing::Timecode(..) => return Err(CliError::TimecodeTiming),
    };

    let mut file_tempo: Option<f64> = None;
    let mut raw: Vec<RawNote> = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick: u64 = 0;
        for event in track {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                    let us = us_per_beat.as_int();
                    if file_tempo.is_none() && us > 0 {
                        file_tempo = Some(60_000_000.0 / f64::from(us));
                    }
                }
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, vel },
                } if vel.as_int() > 0 => raw.push(RawNote {
                    tick,
                    track: track_index,
                    key: key.as_int(),
                    channel: channel.as_int(),
                }),
                _ => {}
            }
        }
    }
    raw.sort_unstable();

    let lowest = raw.iter().map(|n| n.key).min().unwrap_or(0);
    let notes: Vec<NoteTarget> = raw
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let beat = beat_time(n.tick, ticks_per_beat);
            let pitch_row = options.lowest_row + i32::from(n.key - lowest);
            NoteTarget::new(i as u32, pitch_row, beat, instrument_for_channel(n.channel))
        })
        .collect();

    let tempo_bpm = options.tempo_override.or(file_tempo).unwrap_or(DEFAULT_TEMPO_BPM);
    debug!(ticks_per_beat, tracks = smf.tracks.len(), "parsed MIDI header");
    info!(notes = notes.len(), tempo_bpm, "imported MIDI file");

    Ok(TraditionalRequest {
        notes,
        tempo_bpm,
        level: options.level,
        scroll_preference: ScrollPreference::Any,
    })
}

/// Ticks past `u32::MAX` saturate; no real file gets there.
fn beat_time(tick: u64, ticks_per_beat: u32) -> BeatTime {
    BeatTime::new(u32::try_from(tick).unwrap_or(u32::MAX), ticks_per_beat)
}

fn instrument_for_channel(channel: u8) -> EntityKind {
    EntityKind::ALL[usize::from(channel) % EntityKind::ALL.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u4, u7, u15, u24, u28};
    use midly::{Format, Header, Track, TrackEvent};

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        }
    }

    fn end() -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    fn encode(tracks: Vec<Track<'static>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(480))));
        smf.tracks = tracks;
        let mut buf = Vec::new();
        smf.write(&mut buf).unwrap();
        buf
    }

    fn options() -> ImportOptions {
        ImportOptions {
            tempo_override: None,
            level: LevelBounds::new(240, 27),
            lowest_row: 2,
        }
    }

    #[test]
    fn quarter_notes_become_whole_beats() {
        let tempo: Track<'static> = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(400_000))),
            },
            end(),
        ];
        // C4, E4 a beat later (with a zero-velocity note-off between), G4 half a beat after that.
        let melody: Track<'static> = vec![
            note_on(0, 0, 60, 80),
            note_on(480, 0, 60, 0),
            note_on(0, 0, 64, 80),
            note_on(240, 0, 67, 80),
            end(),
        ];
        let request = import(&encode(vec![tempo, melody]), &options()).unwrap();

        assert_eq!(request.tempo_bpm, 150.0);
        assert_eq!(request.notes.len(), 3);
        let rows: Vec<i32> = request.notes.iter().map(|n| n.pitch_row).collect();
        assert_eq!(rows, vec![2, 6, 9]);
        assert_eq!(request.notes[1].time, BeatTime::whole(1));
        assert_eq!(request.notes[2].time, BeatTime::new(3, 2));
        assert!(request.notes.iter().all(|n| n.instrument == EntityKind::Goomba));
    }

    #[test]
    fn channels_pick_instruments_and_override_wins() {
        let track: Track<'static> = vec![note_on(0, 1, 50, 90), note_on(0, 9, 52, 90), end()];
        let opts = ImportOptions {
            tempo_override: Some(90.0),
            ..options()
        };
        let request = import(&encode(vec![track]), &opts).unwrap();
        assert_eq!(request.tempo_bpm, 90.0);
        assert_eq!(request.notes[0].instrument, EntityKind::GreenKoopa);
        assert_eq!(request.notes[1].instrument, EntityKind::GreenKoopa);
        assert_eq!(request.notes[1].pitch_row, 4);
    }

    #[test]
    fn missing_tempo_defaults() {
        let request = import(&encode(vec![vec![note_on(0, 0, 60, 1), end()]]), &options()).unwrap();
        assert_eq!(request.tempo_bpm, DEFAULT_TEMPO_BPM);
        assert_eq!(request.notes[0].pitch_row, 2);
    }

    #[test]
    fn garbage_is_a_midi_error() {
        let err = import(b"not a midi file", &options()).unwrap_err();
        assert!(matches!(err, CliError::Midi(_)));
    }
}
