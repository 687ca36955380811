use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uniformly sampled single-lead recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Samples
    pub data: Vec<f64>,
    /// Sampling frequency in Hz, when known
    pub fs: Option<f64>,
    /// Where the samples came from (file path, generator, ...)
    pub source: String,
}

impl Signal {
    pub fn new(data: Vec<f64>, source: impl Into<String>) -> Self {
        Self {
            data,
            fs: None,
            source: source.into(),
        }
    }

    /// Attach a sampling rate, rejecting anything that is not finite and positive.
    pub fn with_rate(mut self, fs: f64) -> Result<Self, ConfigError> {
        validate_rate(fs)?;
        self.fs = Some(fs);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds, if the sampling rate is known.
    pub fn duration(&self) -> Option<f64> {
        self.fs.map(|fs| self.data.len() as f64 / fs)
    }

    pub fn mean(&self) -> f64 {
        mean(&self.data)
    }

    pub fn std(&self) -> f64 {
        std_dev(&self.data)
    }
}

/// Reject sampling rates that are not finite and positive.
pub fn validate_rate(fs: f64) -> Result<(), ConfigError> {
    if fs.is_finite() && fs > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSamplingRate(fs))
    }
}

/// Fixed-length, read-only view into a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window<'a> {
    /// Offset of the first sample in the owning signal
    pub start: usize,
    pub samples: &'a [f64],
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// One past the last sample, in owning-signal coordinates.
    pub fn end(&self) -> usize {
        self.start + self.samples.len()
    }

    pub fn mean(&self) -> f64 {
        mean(self.samples)
    }

    pub fn to_owned_samples(&self) -> Vec<f64> {
        self.samples.to_vec()
    }
}

/// Accepted peak positions (sample indices within a window).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSet {
    pub indices: Vec<usize>,
}

impl PeakSet {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Inter-peak intervals in seconds.
    pub fn intervals(&self, fs: f64) -> Vec<f64> {
        self.indices
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 / fs)
            .collect()
    }
}

/// Summary of inter-peak intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub n_peaks: usize,
    /// Mean RR interval (seconds)
    pub mean_rr: f64,
    /// Population standard deviation of RR intervals (seconds)
    pub std_rr: f64,
    /// Coefficient of variation of RR intervals
    pub cv: f64,
    /// Implied rate in beats per minute
    pub rate_bpm: Option<f64>,
}

/// Coarse diagnostic class assigned to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    StElevation,
    Afib,
    Tachy,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::Normal, Label::StElevation, Label::Afib, Label::Tachy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "normal",
            Label::StElevation => "st_elevation",
            Label::Afib => "afib",
            Label::Tachy => "tachy",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown label '{}'", s))
    }
}

/// How a time column (if any) was interpreted during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeColumn {
    None,
    Seconds,
    Milliseconds,
    SampleIndex,
    Unknown,
}

/// Provenance record written alongside a converted signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub source: String,
    pub n_samples: usize,
    pub sampling_rate: f64,
    pub duration_seconds: f64,
    pub scale_applied: Option<f64>,
    #[serde(default = "default_time_column")]
    pub time_column: TimeColumn,
}

fn default_time_column() -> TimeColumn {
    TimeColumn::None
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    (data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

pub(crate) fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_rates() {
        let sig = Signal::new(vec![1.0, 2.0], "test");
        assert!(sig.clone().with_rate(0.0).is_err());
        assert!(sig.clone().with_rate(f64::NAN).is_err());
        let sig = sig.with_rate(250.0).expect("valid rate");
        assert_eq!(sig.fs, Some(250.0));
        assert!((sig.duration().unwrap() - 2.0 / 250.0).abs() < 1e-12);
    }

    #[test]
    fn signal_and_window_statistics() {
        let sig = Signal::new(vec![1.0, 3.0, 1.0, 3.0], "test");
        assert_eq!(sig.mean(), 2.0);
        assert_eq!(sig.std(), 1.0);
        let w = Window {
            start: 1,
            samples: &sig.data[1..3],
        };
        assert_eq!(w.end(), 3);
        assert_eq!(w.mean(), 2.0);
        let copy = w.to_owned_samples();
        assert_eq!(copy, vec![3.0, 1.0]);
        assert_eq!(copy.as_slice(), w.samples);
    }

    #[test]
    fn label_names_round_trip() {
        for label in Label::ALL {
            assert_eq!(label.as_str().parse::<Label>().unwrap(), label);
            let js = serde_json::to_string(&label).unwrap();
            assert_eq!(js, format!("\"{}\"", label));
        }
        assert!("brady".parse::<Label>().is_err());
    }

    #[test]
    fn peak_intervals_in_seconds() {
        let peaks = PeakSet::from_indices(vec![0, 250, 375]);
        assert_eq!(peaks.intervals(250.0), vec![1.0, 0.5]);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }
}
