use crate::error::{CodecError, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SLOTS_PER_MEASURE: usize = 96;
pub const DEFAULT_LANES: usize = 96;
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;
pub const DEFAULT_MIN_MEASURES: usize = 16;

/// Acoustic grand piano is program 0, bright acoustic piano is 1.
pub const DEFAULT_PROGRAM: u8 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "midi_roll",
    about = "Convert MIDI files to piano-roll grids and back!"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Prints extra information to the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a MIDI file into a piano-roll grid (JSON).
    Encode {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Where to write the encoded grid. Prints a summary only when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Decode a piano-roll grid (JSON) back into a single-track MIDI file.
    Decode {
        /// Path to a grid previously written by `encode`.
        roll: PathBuf,

        /// Path of the MIDI file to write.
        #[arg(short, long)]
        output: PathBuf,

        /// Activation cutoff in [0.0..=1.0].
        #[arg(short, long, default_value_t = 0.5)]
        threshold: f64,

        /// General MIDI program selected at time zero.
        #[arg(short, long, default_value_t = DEFAULT_PROGRAM)]
        program: u8,

        /// Ticks per beat of the written file.
        #[arg(long, default_value_t = DEFAULT_TICKS_PER_BEAT)]
        ticks_per_beat: u16,

        /// How held notes are treated at measure edges: truncate|continuous.
        #[arg(short, long, default_value = "truncate")]
        boundary: String,
    },

    /// Encode every MIDI file under a directory into one dataset (JSON).
    Preprocess {
        /// Root directory to search for .mid/.midi files.
        root: PathBuf,

        /// Path of the dataset file to write.
        #[arg(short, long)]
        output: PathBuf,

        /// Comma separated lane shifts for augmentation, e.g. `-2,0,2`.
        #[arg(short, long)]
        shift: Option<String>,

        /// Files producing fewer measures than this are ignored.
        #[arg(long, default_value_t = DEFAULT_MIN_MEASURES)]
        min_measures: usize,

        #[command(flatten)]
        grid: GridArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct GridArgs {
    /// Time slots per measure.
    #[arg(long, default_value_t = DEFAULT_SLOTS_PER_MEASURE)]
    pub slots: usize,

    /// Pitch lanes, centered on the 0..=127 MIDI range.
    #[arg(long, default_value_t = DEFAULT_LANES)]
    pub lanes: usize,

    /// Activate every slot a note is held for, not only its onset.
    #[arg(long, default_value_t = false)]
    pub sustain: bool,
}

impl GridArgs {
    pub fn apply(&self, config: &mut CodecConfig) {
        config.slots_per_measure = self.slots;
        config.lanes = self.lanes;
        config.encode_sustain = self.sustain;
    }
}

/// How the decoder treats the edges of a measure when looking for note runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Every measure is decoded on its own, so a note held across a bar line
    /// is closed at the end of one measure and re-struck at the next.
    #[default]
    TruncateAtMeasure,

    /// Runs continue across measures; only the ends of the whole sequence
    /// close a note.
    Continuous,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    pub slots_per_measure: usize,
    pub lanes: usize,
    pub encode_sustain: bool,
    pub threshold: f64,
    /// Resolution of decoded files. Encoding always uses the file's own header.
    pub ticks_per_beat: u16,
    pub program: u8,
    pub velocity: u8,
    pub boundary: BoundaryPolicy,
    /// Treat `NoteOn` with velocity 0 as a `NoteOff` instead of ignoring it.
    pub velocity_zero_is_off: bool,
    pub min_measures: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            slots_per_measure: DEFAULT_SLOTS_PER_MEASURE,
            lanes: DEFAULT_LANES,
            encode_sustain: false,
            threshold: 0.5,
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            program: DEFAULT_PROGRAM,
            velocity: 127,
            boundary: BoundaryPolicy::default(),
            velocity_zero_is_off: false,
            min_measures: DEFAULT_MIN_MEASURES,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.slots_per_measure == 0 {
            return Err(CodecError::InvalidConfig(
                "slots_per_measure must be greater than 0".into(),
            ));
        }
        if self.lanes == 0 || self.lanes > 128 {
            return Err(CodecError::InvalidConfig(format!(
                "lanes must be in 1..=128, got {}",
                self.lanes
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CodecError::InvalidConfig(format!(
                "threshold must be in [0.0..=1.0], got {}",
                self.threshold
            )));
        }
        if self.program > 127 {
            return Err(CodecError::InvalidConfig(format!(
                "program must be in 0..=127, got {}",
                self.program
            )));
        }
        if !(1..=127).contains(&self.velocity) {
            return Err(CodecError::InvalidConfig(format!(
                "velocity must be in 1..=127, got {}",
                self.velocity
            )));
        }
        if self.ticks_per_beat == 0 || self.ticks_per_beat > 0x7fff {
            return Err(CodecError::InvalidConfig(format!(
                "ticks_per_beat must be in 1..=32767, got {}",
                self.ticks_per_beat
            )));
        }
        Ok(())
    }

    /// Number of pitches dropped below the first lane.
    pub fn lane_offset(&self) -> usize {
        (128 - self.lanes.min(128)) / 2
    }
}
