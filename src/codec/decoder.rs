use crate::error::{CodecError, Result};
use crate::model::config::{BoundaryPolicy, CodecConfig};
use crate::model::event::OutputEvent;
use crate::model::roll::{Measure, PianoRoll};

/// Turns measure grids back into note events by looking for edges in each lane.
///
/// Output is always in 4/4 at `ticks_per_beat`. Slot `g` of the whole sequence
/// covers ticks `[g * tpm / slots, (g + 1) * tpm / slots)`; note-ons are rounded
/// up and note-offs down to the nearest tick, so re-encoding places both back in
/// the slot they came from even when slots do not divide the measure evenly.
/// When a slot is narrower than one tick its note-offs share the note-on tick.
#[derive(Debug, Clone)]
pub struct GridDecoder {
    threshold: f64,
    slots_per_measure: usize,
    lanes: usize,
    lane_offset: usize,
    ticks_per_measure: u64,
    program: u8,
    velocity: u8,
    boundary: BoundaryPolicy,
}

impl GridDecoder {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            threshold: config.threshold,
            slots_per_measure: config.slots_per_measure,
            lanes: config.lanes,
            lane_offset: config.lane_offset(),
            ticks_per_measure: 4 * config.ticks_per_beat as u64,
            program: config.program,
            velocity: config.velocity,
            boundary: config.boundary,
        })
    }

    fn tick_floor(&self, slot: u64) -> u64 {
        let scaled = slot as u128 * self.ticks_per_measure as u128;
        (scaled / self.slots_per_measure as u128) as u64
    }

    fn tick_ceil(&self, slot: u64) -> u64 {
        let scaled = slot as u128 * self.ticks_per_measure as u128;
        scaled.div_ceil(self.slots_per_measure as u128) as u64
    }

    /// Decodes measures of any activation type, e.g. `u8` from the encoder or `f32`
    /// probabilities from a model.
    pub fn decode<T>(&self, measures: &[Measure<T>]) -> Result<Vec<OutputEvent>>
    where
        T: Copy + Default + Into<f64>,
    {
        for (idx, measure) in measures.iter().enumerate() {
            if measure.slots() != self.slots_per_measure || measure.lanes() != self.lanes {
                return Err(CodecError::InvalidConfig(format!(
                    "measure {} is {}x{}, expected {}x{}",
                    idx,
                    measure.slots(),
                    measure.lanes(),
                    self.slots_per_measure,
                    self.lanes
                )));
            }
        }

        let slots = self.slots_per_measure;
        let total_slots = measures.len() * slots;
        let active = |g: usize, lane: usize| -> bool {
            let value: f64 = measures[g / slots].get(g % slots, lane).into();
            value >= self.threshold
        };
        let opens_run = |g: usize| match self.boundary {
            BoundaryPolicy::TruncateAtMeasure => g % slots == 0,
            BoundaryPolicy::Continuous => g == 0,
        };
        let closes_run = |g: usize| match self.boundary {
            BoundaryPolicy::TruncateAtMeasure => g % slots == slots - 1,
            BoundaryPolicy::Continuous => g + 1 == total_slots,
        };

        let mut events = vec![OutputEvent::ProgramChange {
            program: self.program,
            delta: 0,
        }];
        let mut last_tick: u64 = 0;
        let mut delta_to = |tick: u64| {
            let delta = tick - last_tick;
            last_tick = tick;
            delta
        };

        for g in 0..total_slots {
            let on_tick = self.tick_ceil(g as u64);
            // A slot narrower than one tick holds its offs at the on tick.
            let off_tick = self.tick_floor(g as u64 + 1).max(on_tick);

            // Ons sit at the start of the slot and offs at its end, so all ons of a
            // slot are emitted before any of its offs to keep deltas non-negative.
            for lane in 0..self.lanes {
                if active(g, lane) && (opens_run(g) || !active(g - 1, lane)) {
                    events.push(OutputEvent::NoteOn {
                        pitch: (lane + self.lane_offset) as u8,
                        velocity: self.velocity,
                        delta: delta_to(on_tick),
                    });
                }
            }
            for lane in 0..self.lanes {
                if active(g, lane) && (closes_run(g) || !active(g + 1, lane)) {
                    events.push(OutputEvent::NoteOff {
                        pitch: (lane + self.lane_offset) as u8,
                        delta: delta_to(off_tick),
                    });
                }
            }
        }

        Ok(events)
    }
}

pub fn decode_roll(roll: &PianoRoll, config: &CodecConfig) -> Result<Vec<OutputEvent>> {
    if roll.slots_per_measure != config.slots_per_measure || roll.lanes != config.lanes {
        return Err(CodecError::InvalidConfig(format!(
            "roll is {}x{} but the codec is configured for {}x{}",
            roll.slots_per_measure, roll.lanes, config.slots_per_measure, config.lanes
        )));
    }
    GridDecoder::new(config)?.decode(roll.measures())
}
