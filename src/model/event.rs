use serde::{Deserialize, Serialize};

/// One event of an input track, reduced to what the encoder cares about.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    NoteOn { pitch: u8, velocity: u8, delta: u32 },
    NoteOff { pitch: u8, delta: u32 },
    ProgramChange { program: u8, delta: u32 },
    /// `denominator` is the real denominator (4 for 3/4), not the SMF exponent.
    TimeSignature { numerator: u8, denominator: u32, delta: u32 },
    Other { delta: u32 },
}

impl RawEvent {
    pub fn delta(&self) -> u32 {
        match *self {
            RawEvent::NoteOn { delta, .. }
            | RawEvent::NoteOff { delta, .. }
            | RawEvent::ProgramChange { delta, .. }
            | RawEvent::TimeSignature { delta, .. }
            | RawEvent::Other { delta } => delta,
        }
    }
}

/// An event produced by the decoder. Deltas are relative to the previous output event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    ProgramChange { program: u8, delta: u64 },
    NoteOn { pitch: u8, velocity: u8, delta: u64 },
    NoteOff { pitch: u8, delta: u64 },
}

impl OutputEvent {
    pub fn delta(&self) -> u64 {
        match *self {
            OutputEvent::ProgramChange { delta, .. }
            | OutputEvent::NoteOn { delta, .. }
            | OutputEvent::NoteOff { delta, .. } => delta,
        }
    }
}
