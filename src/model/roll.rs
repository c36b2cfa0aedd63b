use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};

/// Measures at or beyond this index mean the file is degenerate.
pub const MAX_MEASURES: usize = 1024 * 1024;

/// A fixed-size `[slots][lanes]` grid of activations, stored row-major by slot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Measure<T = u8> {
    slots: usize,
    lanes: usize,
    cells: Vec<T>,
}

impl<T: Copy + Default> Measure<T> {
    pub fn zeroed(slots: usize, lanes: usize) -> Self {
        Self {
            slots,
            lanes,
            cells: vec![T::default(); slots * lanes],
        }
    }

    /// Builds a measure from one row of lane values per slot.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let slots = rows.len();
        let lanes = rows.first().map(|row| row.len()).unwrap_or(0);

        if slots == 0 || lanes == 0 {
            return Err(CodecError::InvalidConfig("measure must not be empty".into()));
        }
        if rows.iter().any(|row| row.len() != lanes) {
            return Err(CodecError::InvalidConfig(
                "measure rows must all have the same number of lanes".into(),
            ));
        }

        Ok(Self {
            slots,
            lanes,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn get(&self, slot: usize, lane: usize) -> T {
        self.cells[slot * self.lanes + lane]
    }

    pub fn set(&mut self, slot: usize, lane: usize, value: T) {
        self.cells[slot * self.lanes + lane] = value;
    }

    pub fn row(&self, slot: usize) -> &[T] {
        &self.cells[slot * self.lanes..(slot + 1) * self.lanes]
    }

    fn is_consistent(&self) -> bool {
        self.cells.len() == self.slots * self.lanes
    }
}

impl Measure<u8> {
    pub fn active_cells(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }
}

/// An ordered sequence of equally sized measures.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PianoRoll {
    pub slots_per_measure: usize,
    pub lanes: usize,
    measures: Vec<Measure>,
}

impl PianoRoll {
    pub fn new(slots_per_measure: usize, lanes: usize) -> Self {
        Self {
            slots_per_measure,
            lanes,
            measures: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// `(num_measures, slots_per_measure, lanes)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.measures.len(), self.slots_per_measure, self.lanes)
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn into_measures(self) -> Vec<Measure> {
        self.measures
    }

    /// Appends zeroed measures until `index` exists and returns it.
    pub fn ensure_measure(&mut self, index: usize) -> Result<&mut Measure> {
        if index >= MAX_MEASURES {
            return Err(CodecError::CapacityExceeded {
                measure: index as u64,
            });
        }

        while self.measures.len() <= index {
            self.measures
                .push(Measure::zeroed(self.slots_per_measure, self.lanes));
        }

        Ok(&mut self.measures[index])
    }

    pub fn active_cells(&self) -> usize {
        self.measures.iter().map(|m| m.active_cells()).sum()
    }

    /// Copy of this roll with every activation moved `shift` lanes up (or down when negative).
    /// Returns `None` when any active cell would leave the lane window.
    pub fn transposed(&self, shift: i32) -> Option<PianoRoll> {
        let mut out = PianoRoll::new(self.slots_per_measure, self.lanes);

        for measure in self.measures.iter() {
            let mut shifted = Measure::zeroed(self.slots_per_measure, self.lanes);
            for slot in 0..measure.slots() {
                for (lane, &value) in measure.row(slot).iter().enumerate() {
                    if value == 0 {
                        continue;
                    }
                    let target = lane as i64 + shift as i64;
                    if target < 0 || target >= self.lanes as i64 {
                        return None;
                    }
                    shifted.set(slot, target as usize, value);
                }
            }
            out.measures.push(shifted);
        }

        Some(out)
    }

    /// Checks that deserialized measures agree with the declared shape.
    pub fn validate(&self) -> Result<()> {
        if self.measures.len() > MAX_MEASURES {
            return Err(CodecError::CapacityExceeded {
                measure: self.measures.len() as u64,
            });
        }

        for (idx, measure) in self.measures.iter().enumerate() {
            if measure.slots() != self.slots_per_measure
                || measure.lanes() != self.lanes
                || !measure.is_consistent()
            {
                return Err(CodecError::InvalidConfig(format!(
                    "measure {} does not match the {}x{} grid shape",
                    idx, self.slots_per_measure, self.lanes
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grows_with_zeroed_measures() {
        let mut roll = PianoRoll::new(4, 3);
        roll.ensure_measure(2).unwrap().set(1, 2, 1);

        assert_eq!(roll.shape(), (3, 4, 3));
        assert_eq!(roll.measures()[0].active_cells(), 0);
        assert_eq!(roll.measures()[1].active_cells(), 0);
        assert_eq!(roll.measures()[2].get(1, 2), 1);

        // Never shrinks.
        roll.ensure_measure(0).unwrap();
        assert_eq!(roll.len(), 3);
    }

    #[test]
    fn ceiling_is_fatal() {
        let mut roll = PianoRoll::new(4, 3);
        let err = roll.ensure_measure(MAX_MEASURES).unwrap_err();
        assert!(matches!(err, CodecError::CapacityExceeded { .. }));
        assert!(roll.is_empty());
    }

    #[test]
    fn transpose_drops_out_of_window_variants() {
        let mut roll = PianoRoll::new(2, 4);
        roll.ensure_measure(0).unwrap().set(0, 1, 1);

        let up = roll.transposed(2).unwrap();
        assert_eq!(up.measures()[0].get(0, 3), 1);
        assert_eq!(up.active_cells(), 1);

        assert!(roll.transposed(3).is_none());
        assert!(roll.transposed(-2).is_none());
        assert_eq!(roll.transposed(-1).unwrap().measures()[0].get(0, 0), 1);
    }

    #[test]
    fn rows_must_be_rectangular() {
        assert!(Measure::from_rows(vec![vec![0.1f32, 0.9], vec![0.0]]).is_err());

        let measure = Measure::from_rows(vec![vec![0.1f32, 0.9], vec![0.0, 0.2]]).unwrap();
        assert_eq!(measure.slots(), 2);
        assert_eq!(measure.lanes(), 2);
        assert_eq!(measure.get(0, 1), 0.9);
    }

    #[test]
    fn validate_catches_mismatched_measures() {
        let json = r#"{
            "slots_per_measure": 2,
            "lanes": 2,
            "measures": [{ "slots": 2, "lanes": 2, "cells": [0, 1, 0] }]
        }"#;
        let roll: PianoRoll = serde_json::from_str(json).unwrap();
        assert!(roll.validate().is_err());
    }
}
