use crate::codec::aggregator::{Interval, NoteIntervals};
use crate::error::{CodecError, Result};
use crate::model::config::CodecConfig;
use crate::model::roll::{MAX_MEASURES, PianoRoll};

/// Rasterizes intervals into measure grids.
///
/// Each measure is filled independently: with sustain encoding a note is held
/// until its end or the end of the measure it started in, whichever comes first.
#[derive(Debug)]
pub struct GridBuilder {
    roll: PianoRoll,
    encode_sustain: bool,
    lane_offset: usize,
}

impl GridBuilder {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            roll: PianoRoll::new(config.slots_per_measure, config.lanes),
            encode_sustain: config.encode_sustain,
            lane_offset: config.lane_offset(),
        }
    }

    pub fn rasterize(&mut self, interval: Interval) -> Result<()> {
        let slots = self.roll.slots_per_measure;

        if interval.lane >= self.roll.lanes {
            return Err(CodecError::OutOfRange {
                pitch: (interval.lane + self.lane_offset).min(u8::MAX as usize) as u8,
                lanes: self.roll.lanes,
            });
        }

        let measure_pos = (interval.start.max(0.0) / slots as f64).floor();
        if !measure_pos.is_finite() || measure_pos >= MAX_MEASURES as f64 {
            return Err(CodecError::CapacityExceeded {
                measure: if measure_pos.is_finite() {
                    measure_pos as u64
                } else {
                    u64::MAX
                },
            });
        }

        let measure_idx = measure_pos as usize;
        let base = (measure_idx * slots) as f64;
        let start_slot = ((interval.start.max(0.0) - base).floor() as usize).min(slots - 1);

        let measure = self.roll.ensure_measure(measure_idx)?;
        measure.set(start_slot, interval.lane, 1);

        if self.encode_sustain {
            let end_slot = (interval.end - base).min(slots as f64);
            let mut slot = start_slot;
            while (slot as f64) < end_slot {
                measure.set(slot, interval.lane, 1);
                slot += 1;
            }
        }

        Ok(())
    }

    pub fn finish(self) -> PianoRoll {
        self.roll
    }
}

pub fn build_grid(intervals: NoteIntervals, config: &CodecConfig) -> Result<PianoRoll> {
    let mut builder = GridBuilder::new(config);
    for interval in intervals {
        builder.rasterize(interval)?;
    }
    Ok(builder.finish())
}
