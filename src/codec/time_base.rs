use crate::error::{CodecError, Result};
use crate::model::event::RawEvent;
use log::debug;

/// Ticks per measure as an exact, reduced fraction. Time signatures such as 7/12
/// do not divide evenly into ticks, so this is never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicksPerMeasure {
    numer: u64,
    denom: u64,
}

impl TicksPerMeasure {
    pub fn new(numer: u64, denom: u64) -> Result<Self> {
        if numer == 0 || denom == 0 {
            return Err(CodecError::UnsupportedFormat(format!(
                "degenerate measure length {}/{}",
                numer, denom
            )));
        }

        let divisor = gcd(numer, denom);
        Ok(Self {
            numer: numer / divisor,
            denom: denom / divisor,
        })
    }

    /// 4/4 at the given resolution.
    pub fn common_time(ticks_per_beat: u16) -> Result<Self> {
        Self::new(4 * ticks_per_beat as u64, 1)
    }

    pub fn numer(&self) -> u64 {
        self.numer
    }

    pub fn denom(&self) -> u64 {
        self.denom
    }

    pub fn as_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }

    /// Position of an absolute tick in fractional slot units.
    pub fn tick_to_slot(&self, tick: u64, slots_per_measure: usize) -> f64 {
        let scaled = tick as u128 * slots_per_measure as u128 * self.denom as u128;
        scaled as f64 / self.numer as f64
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub ticks_per_beat: u16,
    pub ticks_per_measure: TicksPerMeasure,
}

/// Derives the single measure length used for the whole file.
///
/// Starts from 4/4 and adopts each time signature found, in file order across all
/// tracks. A second signature that changes the measure length is rejected.
pub fn resolve_time_base(tracks: &[Vec<RawEvent>], ticks_per_beat: u16) -> Result<TimeBase> {
    if ticks_per_beat == 0 {
        return Err(CodecError::UnsupportedFormat(
            "ticks per beat must be greater than 0".into(),
        ));
    }

    let whole_note = 4 * ticks_per_beat as u64;
    let mut ticks_per_measure = TicksPerMeasure::common_time(ticks_per_beat)?;
    let mut has_time_sig = false;

    for (track_idx, track) in tracks.iter().enumerate() {
        for event in track.iter() {
            let RawEvent::TimeSignature {
                numerator,
                denominator,
                ..
            } = *event
            else {
                continue;
            };

            let candidate = TicksPerMeasure::new(whole_note * numerator as u64, denominator as u64)?;
            if has_time_sig && candidate != ticks_per_measure {
                return Err(CodecError::UnsupportedFormat(
                    "multiple incompatible time signatures".into(),
                ));
            }

            debug!(
                "Time signature {}/{} on track {} -> {:.3} ticks per measure",
                numerator,
                denominator,
                track_idx,
                candidate.as_f64()
            );
            ticks_per_measure = candidate;
            has_time_sig = true;
        }
    }

    Ok(TimeBase {
        ticks_per_beat,
        ticks_per_measure,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn sig(numerator: u8, denominator: u32) -> RawEvent {
        RawEvent::TimeSignature {
            numerator,
            denominator,
            delta: 0,
        }
    }

    #[test]
    fn defaults_to_common_time() {
        let base = resolve_time_base(&[vec![RawEvent::Other { delta: 10 }]], 480).unwrap();
        assert_eq!(base.ticks_per_measure, TicksPerMeasure::new(1920, 1).unwrap());
    }

    #[test]
    fn compound_meter() {
        let base = resolve_time_base(&[vec![sig(6, 8)]], 480).unwrap();
        assert_eq!(base.ticks_per_measure.numer(), 1440);
        assert_eq!(base.ticks_per_measure.denom(), 1);
    }

    #[test]
    fn fractional_measures_stay_exact() {
        let base = resolve_time_base(&[vec![sig(7, 12)]], 100).unwrap();
        // 400 * 7 / 12 = 700 / 3
        assert_eq!(base.ticks_per_measure.numer(), 700);
        assert_eq!(base.ticks_per_measure.denom(), 3);
        assert_eq!(base.ticks_per_measure.tick_to_slot(700, 96), 288.0);
    }

    #[test]
    fn repeated_identical_signature_is_accepted() {
        let tracks = vec![vec![sig(4, 4)], vec![sig(4, 4)]];
        assert!(resolve_time_base(&tracks, 480).is_ok());
    }

    #[test]
    fn equivalent_signature_is_accepted() {
        // 2/4 and 4/8 yield the same measure length.
        let tracks = vec![vec![sig(2, 4), sig(4, 8)]];
        let base = resolve_time_base(&tracks, 480).unwrap();
        assert_eq!(base.ticks_per_measure.numer(), 960);
    }

    #[test]
    fn conflicting_signatures_are_rejected() {
        let tracks = vec![vec![sig(4, 4)], vec![sig(3, 4)]];
        let err = resolve_time_base(&tracks, 480).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedFormat(_)));
    }

    #[test]
    fn degenerate_signature_is_rejected() {
        assert!(resolve_time_base(&[vec![sig(0, 4)]], 480).is_err());
        assert!(resolve_time_base(&[], 0).is_err());
    }
}
