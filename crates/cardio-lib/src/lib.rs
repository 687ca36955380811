pub mod conditioning;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod labeler;
pub mod pipeline;
pub mod signal;
pub mod synth;

pub use conditioning::{condition, filter_band, normalize, window, ConditioningConfig, FilterBackend};
pub use config::PipelineConfig;
pub use error::{ConfigError, Error, IngestError, Result};
pub use ingest::{ingest, ingest_path, IngestOptions, DEFAULT_SAMPLING_RATE};
pub use labeler::{detect_peaks, interval_stats, label, LabelOutcome, LabelerConfig, PeakConfig, RuleSet};
pub use pipeline::{auto_label, condition_and_label, LabeledWindow};
pub use signal::*;
pub use synth::{generate, Archetype, SynthConfig};
