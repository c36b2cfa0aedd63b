use thiserror::Error;

/// Failures that abandon the conversion of a single file.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported MIDI format: {0}")]
    UnsupportedFormat(String),

    #[error("Note {pitch} is outside the {lanes} lane window")]
    OutOfRange { pitch: u8, lanes: usize },

    #[error("Measure index {measure} exceeds the measure ceiling")]
    CapacityExceeded { measure: u64 },

    #[error("Delta of {0} ticks does not fit in a MIDI event")]
    DeltaOverflow(u64),

    #[error("Invalid codec configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse MIDI: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<midly::Error> for CodecError {
    fn from(err: midly::Error) -> Self {
        CodecError::Parse(format!("{:?}", err))
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
