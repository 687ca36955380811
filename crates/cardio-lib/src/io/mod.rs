//! On-disk artifacts: sample series, metadata sidecars and label manifests.

pub mod text;

pub use text::*;
