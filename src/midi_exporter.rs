use crate::codec::decoder::decode_roll;
use crate::error::{CodecError, Result};
use crate::model::config::CodecConfig;
use crate::model::event::OutputEvent;
use crate::model::roll::PianoRoll;
use log::debug;
use midly::num::{u4, u7, u15, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use std::path::Path;

const MAX_DELTA: u64 = 0x0fff_ffff;

/// Builds a single-track file on channel 0 from decoded events.
pub fn events_to_smf(events: &[OutputEvent], ticks_per_beat: u16) -> Result<Smf<'static>> {
    if ticks_per_beat == 0 || ticks_per_beat > 0x7fff {
        return Err(CodecError::InvalidConfig(format!(
            "ticks_per_beat must be in 1..=32767, got {}",
            ticks_per_beat
        )));
    }

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(ticks_per_beat)),
    ));

    let channel = u4::new(0);
    let mut track: Track<'static> = Vec::with_capacity(events.len() + 1);

    for event in events.iter() {
        let delta = event.delta();
        if delta > MAX_DELTA {
            return Err(CodecError::DeltaOverflow(delta));
        }

        let (pitch, value) = match *event {
            OutputEvent::ProgramChange { program, .. } => (None, program),
            OutputEvent::NoteOn {
                pitch, velocity, ..
            } => (Some(pitch), velocity),
            OutputEvent::NoteOff { pitch, .. } => (Some(pitch), 0),
        };
        if pitch.unwrap_or(0) > 127 || value > 127 {
            return Err(CodecError::InvalidConfig(format!(
                "event {:?} has a data byte above 127",
                event
            )));
        }

        let message = match *event {
            OutputEvent::ProgramChange { program, .. } => MidiMessage::ProgramChange {
                program: u7::new(program),
            },
            OutputEvent::NoteOn {
                pitch, velocity, ..
            } => MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(velocity),
            },
            OutputEvent::NoteOff { pitch, .. } => MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(127),
            },
        };

        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    Ok(smf)
}

pub fn roll_to_smf(roll: &PianoRoll, config: &CodecConfig) -> Result<Smf<'static>> {
    let events = decode_roll(roll, config)?;
    debug!(
        "Decoded {} measures into {} events..!",
        roll.len(),
        events.len()
    );
    events_to_smf(&events, config.ticks_per_beat)
}

pub fn roll_to_midi_bytes(roll: &PianoRoll, config: &CodecConfig) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    roll_to_smf(roll, config)?.write_std(&mut bytes)?;
    Ok(bytes)
}

pub fn export_midi_file<P: AsRef<Path>>(
    path: P,
    roll: &PianoRoll,
    config: &CodecConfig,
) -> Result<()> {
    roll_to_smf(roll, config)?.save(path.as_ref())?;
    debug!("Wrote {}", path.as_ref().display());
    Ok(())
}
