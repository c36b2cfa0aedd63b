use crate::codec::encode_tracks;
use crate::error::{CodecError, Result};
use crate::model::config::CodecConfig;
use crate::model::event::RawEvent;
use crate::model::roll::PianoRoll;
use log::debug;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

pub fn import_midi_file<P: AsRef<Path>>(path: P, config: &CodecConfig) -> Result<PianoRoll> {
    let bytes = fs::read(path.as_ref())?;

    debug!("Read {} bytes from {}", bytes.len(), path.as_ref().display());
    midi_bytes_to_roll(&bytes, config)
}

pub fn midi_bytes_to_roll(bytes: &[u8], config: &CodecConfig) -> Result<PianoRoll> {
    let smf = Smf::parse(bytes)?;
    let (ticks_per_beat, tracks) = smf_to_raw_tracks(&smf)?;

    let roll = encode_tracks(&tracks, ticks_per_beat, config)?;
    debug!(
        "Encoded {} measures with {} active cells..!",
        roll.len(),
        roll.active_cells()
    );

    Ok(roll)
}

/// Lowers a parsed file to its ticks per beat and one `RawEvent` list per track.
pub fn smf_to_raw_tracks(smf: &Smf) -> Result<(u16, Vec<Vec<RawEvent>>)> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(_fps, _subframe) => {
            return Err(CodecError::UnsupportedFormat(
                "SMPTE timecode midi timing is not supported".into(),
            ));
        }
    };

    debug!("Ticks per quarter note: {}", ticks_per_beat);
    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let tracks = smf
        .tracks
        .iter()
        .map(|track| track.iter().map(lower_event).collect::<Result<Vec<_>>>())
        .collect::<Result<Vec<_>>>()?;

    Ok((ticks_per_beat, tracks))
}

fn lower_event(event: &TrackEvent) -> Result<RawEvent> {
    let delta = event.delta.as_int();

    let raw = match event.kind {
        TrackEventKind::Midi { message, .. } => match message {
            MidiMessage::NoteOn { key, vel } => RawEvent::NoteOn {
                pitch: key.as_int(),
                velocity: vel.as_int(),
                delta,
            },
            MidiMessage::NoteOff { key, .. } => RawEvent::NoteOff {
                pitch: key.as_int(),
                delta,
            },
            MidiMessage::ProgramChange { program } => RawEvent::ProgramChange {
                program: program.as_int(),
                delta,
            },
            _ => RawEvent::Other { delta },
        },
        TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denom_pow, _, _)) => {
            let denominator = 2u32.checked_pow(denom_pow as u32).ok_or_else(|| {
                CodecError::UnsupportedFormat(format!(
                    "time signature denominator 2^{} is out of range",
                    denom_pow
                ))
            })?;
            RawEvent::TimeSignature {
                numerator,
                denominator,
                delta,
            }
        }
        _ => RawEvent::Other { delta },
    };

    Ok(raw)
}

#[cfg(test)]
mod test {
    use super::*;
    use midly::num::{u4, u7, u15, u28};
    use midly::{Format, Header};

    fn midi(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn note_on(delta: u32, key: u8) -> TrackEvent<'static> {
        midi(
            delta,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            },
        )
    }

    fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
        midi(
            delta,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    fn to_bytes(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(480)),
        ));
        for mut track in tracks {
            track.push(meta(0, MetaMessage::EndOfTrack));
            smf.tracks.push(track);
        }

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn imports_notes_across_tracks() {
        env_logger::try_init().unwrap_or(());

        let bytes = to_bytes(vec![
            vec![
                meta(0, MetaMessage::TimeSignature(4, 2, 24, 8)),
                meta(0, MetaMessage::Tempo(midly::num::u24::new(500_000))),
            ],
            vec![note_on(0, 60), note_off(480, 60), note_on(1920, 62), note_off(20, 62)],
        ]);

        let roll = midi_bytes_to_roll(&bytes, &CodecConfig::default()).unwrap();
        assert_eq!(roll.shape(), (2, 96, 96));
        assert_eq!(roll.measures()[0].get(0, 44), 1);
        assert_eq!(roll.measures()[1].get(24, 46), 1);
        assert_eq!(roll.active_cells(), 2);
    }

    #[test]
    fn lowers_time_signature_denominator() {
        let event = meta(7, MetaMessage::TimeSignature(6, 3, 24, 8));
        assert_eq!(
            lower_event(&event).unwrap(),
            RawEvent::TimeSignature {
                numerator: 6,
                denominator: 8,
                delta: 7
            }
        );

        let event = meta(0, MetaMessage::TimeSignature(4, 40, 24, 8));
        assert!(lower_event(&event).is_err());
    }

    #[test]
    fn conflicting_time_signatures_fail_the_file() {
        env_logger::try_init().unwrap_or(());

        let bytes = to_bytes(vec![
            vec![meta(0, MetaMessage::TimeSignature(4, 2, 24, 8))],
            vec![meta(1920, MetaMessage::TimeSignature(3, 2, 24, 8)), note_on(0, 60)],
        ]);

        let err = midi_bytes_to_roll(&bytes, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedFormat(_)));
    }

    #[test]
    fn repeated_time_signature_is_fine() {
        env_logger::try_init().unwrap_or(());

        let bytes = to_bytes(vec![vec![
            meta(0, MetaMessage::TimeSignature(4, 2, 24, 8)),
            meta(1920, MetaMessage::TimeSignature(4, 2, 24, 8)),
            note_on(0, 60),
            note_off(20, 60),
        ]]);

        let roll = midi_bytes_to_roll(&bytes, &CodecConfig::default()).unwrap();
        assert_eq!(roll.len(), 2);
    }

    #[test]
    fn high_note_abandons_file() {
        env_logger::try_init().unwrap_or(());

        let bytes = to_bytes(vec![vec![note_on(0, 60), note_off(20, 60), note_on(0, 127)]]);
        let err = midi_bytes_to_roll(&bytes, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { pitch: 127, .. }));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = midi_bytes_to_roll(b"not a midi file", &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = import_midi_file("./does/not/exist.mid", &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }
}
