use crate::codec::time_base::TimeBase;
use crate::error::{CodecError, Result};
use crate::model::config::CodecConfig;
use crate::model::event::RawEvent;
use log::{debug, warn};

/// Programs from here on are percussion and sound effects, not pitched content.
pub const FIRST_UNPITCHED_PROGRAM: u8 = 0x70;

/// A sounding span of one lane, in fractional slot units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lane: usize,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Default)]
struct LaneState {
    closed: Vec<Interval>,
    open: Option<f64>,
}

impl LaneState {
    fn close(&mut self, lane: usize, end: f64) {
        if let Some(start) = self.open.take() {
            self.closed.push(Interval {
                lane,
                start,
                end: end.max(start),
            });
        }
    }
}

/// Closed intervals for every lane, in the order they were opened.
#[derive(Debug, Default)]
pub struct NoteIntervals {
    lanes: Vec<Vec<Interval>>,
    /// Note-offs that had no open interval to close.
    pub stray_note_offs: usize,
    /// Tracks cut short by a percussion program change.
    pub truncated_tracks: usize,
}

impl NoteIntervals {
    pub fn lane(&self, lane: usize) -> &[Interval] {
        self.lanes.get(lane).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.lanes.iter().flatten()
    }
}

impl IntoIterator for NoteIntervals {
    type Item = Interval;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Vec<Interval>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.lanes.into_iter().flatten()
    }
}

/// Pairs note-on/note-off events into per-lane intervals.
///
/// Lane state is shared by every track of a file, while each track keeps its own
/// running tick clock.
#[derive(Debug)]
pub struct NoteIntervalAggregator {
    time_base: TimeBase,
    slots_per_measure: usize,
    lane_count: usize,
    lane_offset: usize,
    velocity_zero_is_off: bool,
    state: Vec<LaneState>,
    stray_note_offs: usize,
    truncated_tracks: usize,
}

impl NoteIntervalAggregator {
    pub fn new(time_base: TimeBase, config: &CodecConfig) -> Self {
        let mut state = Vec::with_capacity(config.lanes);
        state.resize_with(config.lanes, LaneState::default);

        Self {
            time_base,
            slots_per_measure: config.slots_per_measure,
            lane_count: config.lanes,
            lane_offset: config.lane_offset(),
            velocity_zero_is_off: config.velocity_zero_is_off,
            state,
            stray_note_offs: 0,
            truncated_tracks: 0,
        }
    }

    fn lane_for(&self, pitch: u8) -> Option<usize> {
        let lane = pitch as i64 - self.lane_offset as i64;
        (0..self.lane_count as i64)
            .contains(&lane)
            .then_some(lane as usize)
    }

    fn slot_at(&self, tick: u64) -> f64 {
        self.time_base
            .ticks_per_measure
            .tick_to_slot(tick, self.slots_per_measure)
    }

    /// Feeds one track. An out-of-window note aborts with `OutOfRange`.
    pub fn consume_track(&mut self, track_idx: usize, track: &[RawEvent]) -> Result<()> {
        let mut abs_tick: u64 = 0;

        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta() as u64);

            match *event {
                RawEvent::ProgramChange { program, .. } if program >= FIRST_UNPITCHED_PROGRAM => {
                    warn!(
                        "Unpitched program {} on track {} at tick {}, skipping the rest of the track..!",
                        program, track_idx, abs_tick
                    );
                    self.truncated_tracks += 1;
                    break;
                }
                RawEvent::NoteOn { pitch, velocity: 0, .. } => {
                    if self.velocity_zero_is_off {
                        self.note_off(pitch, abs_tick);
                    }
                }
                RawEvent::NoteOn { pitch, .. } => {
                    let Some(lane) = self.lane_for(pitch) else {
                        return Err(CodecError::OutOfRange {
                            pitch,
                            lanes: self.lane_count,
                        });
                    };
                    let start = self.slot_at(abs_tick);
                    let state = &mut self.state[lane];

                    if let Some(open_start) = state.open {
                        debug!(
                            "Retrigger of note {} at tick {}, closing the previous one..!",
                            pitch, abs_tick
                        );
                        state.close(lane, open_start + 1.0);
                    }
                    state.open = Some(start);
                }
                RawEvent::NoteOff { pitch, .. } => self.note_off(pitch, abs_tick),
                _ => {}
            }
        }

        Ok(())
    }

    fn note_off(&mut self, pitch: u8, abs_tick: u64) {
        let end = self.slot_at(abs_tick);

        match self.lane_for(pitch) {
            Some(lane) if self.state[lane].open.is_some() => {
                self.state[lane].close(lane, end);
            }
            _ => {
                debug!("Orphaned NoteOff for {} at tick {}..!", pitch, abs_tick);
                self.stray_note_offs += 1;
            }
        }
    }

    /// Closes whatever is still sounding one slot after it started.
    pub fn finish(self) -> NoteIntervals {
        let mut lanes = Vec::with_capacity(self.state.len());

        for (lane, mut state) in self.state.into_iter().enumerate() {
            if let Some(start) = state.open {
                debug!(
                    "Unclosed note on lane {} at slot {:.3}, auto-closing..!",
                    lane, start
                );
                state.close(lane, start + 1.0);
            }
            lanes.push(state.closed);
        }

        NoteIntervals {
            lanes,
            stray_note_offs: self.stray_note_offs,
            truncated_tracks: self.truncated_tracks,
        }
    }
}

/// Runs every track of a file through a fresh aggregator.
pub fn aggregate_intervals(
    tracks: &[Vec<RawEvent>],
    time_base: TimeBase,
    config: &CodecConfig,
) -> Result<NoteIntervals> {
    let mut aggregator = NoteIntervalAggregator::new(time_base, config);
    for (track_idx, track) in tracks.iter().enumerate() {
        aggregator.consume_track(track_idx, track)?;
    }
    Ok(aggregator.finish())
}
