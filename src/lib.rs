mod codec;
mod error;
mod midi_exporter;
mod midi_importer;
mod model;
mod preprocess;
mod util;

pub use codec::aggregator::*;
pub use codec::builder::*;
pub use codec::decoder::*;
pub use codec::encode_tracks;
pub use codec::time_base::*;
pub use error::*;
pub use midi_exporter::*;
pub use midi_importer::*;
pub use model::config::*;
pub use model::event::*;
pub use model::roll::*;
pub use preprocess::*;
pub use util::*;
