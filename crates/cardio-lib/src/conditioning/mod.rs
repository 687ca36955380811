//! Band-limiting, normalization and fixed-length windowing.

#[cfg(feature = "iir")]
pub mod iir;
pub mod spectral;

use crate::error::ConfigError;
use crate::signal::{mean, std_dev, validate_rate, Window};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Guard added to the standard deviation so constant signals normalize to zero.
pub const NORMALIZE_EPSILON: f64 = 1e-8;

/// Which band-pass implementation `filter_band` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterBackend {
    /// Order-3 Butterworth, forward-backward (zero phase)
    Iir,
    /// FFT bin masking
    Spectral,
}

impl FilterBackend {
    /// Whether the IIR implementation was compiled in (`iir` feature).
    pub const fn iir_available() -> bool {
        cfg!(feature = "iir")
    }

    /// Best backend this build offers.
    pub const fn preferred() -> Self {
        if Self::iir_available() {
            FilterBackend::Iir
        } else {
            FilterBackend::Spectral
        }
    }

    /// Map a requested backend onto what this build supports. `PipelineConfig`
    /// resolves once on validation.
    pub fn resolve(self) -> Self {
        match self {
            FilterBackend::Iir if !Self::iir_available() => {
                info!("IIR band-pass not compiled in; using FFT mask fallback (approximate)");
                FilterBackend::Spectral
            }
            other => other,
        }
    }
}

impl Default for FilterBackend {
    /// Requests the IIR filter; [`FilterBackend::resolve`] downgrades it.
    fn default() -> Self {
        FilterBackend::Iir
    }
}

/// Parameters for the band-pass + normalize preprocessing step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub backend: FilterBackend,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            low_hz: 0.5,
            high_hz: 40.0,
            backend: FilterBackend::default(),
        }
    }
}

impl ConditioningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_band(self.low_hz, self.high_hz)
    }
}

fn validate_band(low_hz: f64, high_hz: f64) -> Result<(), ConfigError> {
    if !(low_hz.is_finite() && high_hz.is_finite()) || low_hz <= 0.0 || low_hz >= high_hz {
        return Err(ConfigError::InvalidBand { low_hz, high_hz });
    }
    Ok(())
}

/// Band-pass `samples` to `[low_hz, high_hz]`. Output length always equals input length.
pub fn filter_band(
    samples: &[f64],
    low_hz: f64,
    high_hz: f64,
    fs: f64,
    backend: FilterBackend,
) -> Result<Vec<f64>, ConfigError> {
    validate_rate(fs)?;
    validate_band(low_hz, high_hz)?;
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    debug!(
        "band-pass {:.2}-{:.2} Hz at {} Hz over {} samples ({:?})",
        low_hz,
        high_hz,
        fs,
        samples.len(),
        backend
    );
    match backend.resolve() {
        #[cfg(feature = "iir")]
        FilterBackend::Iir => iir::bandpass_filtfilt(samples, low_hz, high_hz, fs),
        #[cfg(not(feature = "iir"))]
        FilterBackend::Iir => unreachable!("resolve never yields Iir without the iir feature"),
        FilterBackend::Spectral => spectral::bandpass_mask(samples, low_hz, high_hz, fs),
    }
}

/// Z-score: subtract the mean, divide by `std + 1e-8`.
pub fn normalize(samples: &[f64]) -> Vec<f64> {
    let m = mean(samples);
    let denom = std_dev(samples) + NORMALIZE_EPSILON;
    samples.iter().map(|x| (x - m) / denom).collect()
}

/// Samples per window: `floor(window_seconds * fs)`.
pub fn window_len(fs: f64, window_seconds: f64) -> Result<usize, ConfigError> {
    validate_rate(fs)?;
    let invalid = ConfigError::InvalidWindow {
        seconds: window_seconds,
        sampling_rate: fs,
    };
    if !window_seconds.is_finite() || window_seconds <= 0.0 {
        return Err(invalid);
    }
    let len = (window_seconds * fs).floor() as usize;
    if len == 0 {
        return Err(invalid);
    }
    Ok(len)
}

/// Slice into consecutive, non-overlapping windows. A trailing partial window is
/// dropped, so a signal shorter than one window yields none.
pub fn window(samples: &[f64], fs: f64, window_seconds: f64) -> Result<Vec<Window<'_>>, ConfigError> {
    let len = window_len(fs, window_seconds)?;
    Ok(samples
        .chunks_exact(len)
        .enumerate()
        .map(|(idx, chunk)| Window {
            start: idx * len,
            samples: chunk,
        })
        .collect())
}

/// Band-pass then normalize, the preprocessing applied before windowing.
pub fn condition(samples: &[f64], fs: f64, cfg: &ConditioningConfig) -> Result<Vec<f64>, ConfigError> {
    let filtered = filter_band(samples, cfg.low_hz, cfg.high_hz, fs, cfg.backend)?;
    Ok(normalize(&filtered))
}
