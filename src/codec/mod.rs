pub mod aggregator;
pub mod builder;
pub mod decoder;
pub mod time_base;

use crate::error::Result;
use crate::model::config::CodecConfig;
use crate::model::event::RawEvent;
use crate::model::roll::PianoRoll;
use log::debug;

/// Full encode pipeline over already lowered tracks.
pub fn encode_tracks(
    tracks: &[Vec<RawEvent>],
    ticks_per_beat: u16,
    config: &CodecConfig,
) -> Result<PianoRoll> {
    config.validate()?;

    let time_base = time_base::resolve_time_base(tracks, ticks_per_beat)?;
    let intervals = aggregator::aggregate_intervals(tracks, time_base, config)?;

    debug!(
        "Aggregated {} intervals ({} stray note-offs, {} truncated tracks)",
        intervals.len(),
        intervals.stray_note_offs,
        intervals.truncated_tracks
    );

    builder::build_grid(intervals, config)
}
