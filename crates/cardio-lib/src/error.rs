use thiserror::Error;

/// Failures while turning raw delimited text into a signal.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input contains no data rows")]
    Empty,
    #[error("no numeric values found in input")]
    NoNumericValues,
    #[error("non-positive time difference {delta} at sample {row}")]
    NonPositiveTimeDelta { row: usize, delta: f64 },
    #[error("single-column input cannot have separate time ({time_col}) and value ({value_col}) columns")]
    ConflictingColumns { time_col: usize, value_col: usize },
    #[error("column {column} is out of range for a table with {width} columns")]
    ColumnOutOfRange { column: usize, width: usize },
    #[error("non-finite number on line {row}")]
    NonFinite { row: usize },
    #[error("invalid ingest option: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invalid parameter combinations for synthesis, conditioning or labeling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid band: low {low_hz} Hz must be positive and below high {high_hz} Hz")]
    InvalidBand { low_hz: f64, high_hz: f64 },
    #[error("band edge {high_hz} Hz is not below Nyquist ({nyquist} Hz)")]
    BandAboveNyquist { high_hz: f64, nyquist: f64 },
    #[error("sampling rate must be finite and positive, got {0}")]
    InvalidSamplingRate(f64),
    #[error("window of {seconds} s at {sampling_rate} Hz holds no samples")]
    InvalidWindow { seconds: f64, sampling_rate: f64 },
    #[error("duration must be finite and positive, got {0}")]
    InvalidDuration(f64),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Umbrella error for pipeline helpers that both compute and touch disk.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("line {line} is not a number: {text}")]
    Parse { line: usize, text: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
