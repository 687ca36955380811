use crate::signal::{mean, std_dev, IntervalStats, Label, PeakSet};
use log::debug;
use serde::{Deserialize, Serialize};

/// Peak picker parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Minimum spacing between accepted peaks (seconds).
    pub min_distance_s: f64,
    /// Amplitude threshold as `mean + rel_threshold * std` of the window.
    pub rel_threshold: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            min_distance_s: 0.35,
            rel_threshold: 0.5,
        }
    }
}

/// Greedy left-to-right local-maximum picker.
pub fn detect_peaks(samples: &[f64], fs: f64, cfg: &PeakConfig) -> PeakSet {
    if samples.len() < 3 {
        return PeakSet::default();
    }
    let threshold = mean(samples) + cfg.rel_threshold * std_dev(samples);
    let min_gap = (cfg.min_distance_s * fs).max(0.0) as usize;
    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..samples.len() - 1 {
        let y = samples[i];
        if y > samples[i - 1] && y > samples[i + 1] && y > threshold {
            let spaced = peaks.last().map_or(true, |&last| i - last >= min_gap);
            if spaced {
                peaks.push(i);
            }
        }
    }
    PeakSet::from_indices(peaks)
}

/// RR summary for a peak set; `None` with fewer than two peaks.
pub fn interval_stats(peaks: &PeakSet, fs: f64) -> Option<IntervalStats> {
    if peaks.len() < 2 {
        return None;
    }
    let rr = peaks.intervals(fs);
    let mean_rr = mean(&rr);
    let std_rr = std_dev(&rr);
    Some(IntervalStats {
        n_peaks: peaks.len(),
        mean_rr,
        std_rr,
        cv: std_rr / (mean_rr + 1e-9),
        rate_bpm: (mean_rr > 0.0).then(|| 60.0 / mean_rr),
    })
}

/// Everything a rule may look at for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFeatures {
    /// Window mean minus global mean
    pub st_offset: f64,
    pub global_std: f64,
    pub stats: Option<IntervalStats>,
}

/// A single thresholded predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// Sustained offset: `st_offset > ratio * global_std`
    StOffset { ratio: f64 },
    /// Irregular rhythm: RR coefficient of variation above `max_cv`
    RrVariability { max_cv: f64 },
    /// Fast rhythm: implied rate above `bpm`
    RateAbove { bpm: f64 },
}

impl Criterion {
    pub fn matches(&self, features: &WindowFeatures) -> bool {
        match *self {
            Criterion::StOffset { ratio } => features.st_offset > ratio * features.global_std,
            Criterion::RrVariability { max_cv } => features.stats.is_some_and(|s| s.cv > max_cv),
            Criterion::RateAbove { bpm } => features
                .stats
                .and_then(|s| s.rate_bpm)
                .is_some_and(|rate| rate > bpm),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub label: Label,
    #[serde(flatten)]
    pub criterion: Criterion,
}

/// Ordered rules; the first match decides, otherwise the window is `normal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub const FALLBACK: Label = Label::Normal;

    pub fn evaluate(&self, features: &WindowFeatures) -> Label {
        self.rules
            .iter()
            .find(|rule| rule.criterion.matches(features))
            .map_or(Self::FALLBACK, |rule| rule.label)
    }
}

impl Default for RuleSet {
    /// ST offset outranks rhythm irregularity, which outranks rate.
    fn default() -> Self {
        Self {
            rules: vec![
                Rule {
                    label: Label::StElevation,
                    criterion: Criterion::StOffset { ratio: 0.5 },
                },
                Rule {
                    label: Label::Afib,
                    criterion: Criterion::RrVariability { max_cv: 0.25 },
                },
                Rule {
                    label: Label::Tachy,
                    criterion: Criterion::RateAbove { bpm: 100.0 },
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    pub peaks: PeakConfig,
    pub rules: RuleSet,
}

/// Label plus the measurements that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelOutcome {
    pub label: Label,
    pub stats: Option<IntervalStats>,
    pub st_offset: f64,
    pub n_peaks: usize,
}

/// Classify one window against whole-recording statistics.
pub fn label(
    window: &[f64],
    fs: f64,
    global_mean: f64,
    global_std: f64,
    cfg: &LabelerConfig,
) -> LabelOutcome {
    let peaks = detect_peaks(window, fs, &cfg.peaks);
    let features = WindowFeatures {
        st_offset: mean(window) - global_mean,
        global_std,
        stats: interval_stats(&peaks, fs),
    };
    let label = cfg.rules.evaluate(&features);
    debug!(
        "window of {} samples: {} peaks, offset {:.3}, cv {:?}, rate {:?} -> {}",
        window.len(),
        peaks.len(),
        features.st_offset,
        features.stats.map(|s| s.cv),
        features.stats.and_then(|s| s.rate_bpm),
        label
    );
    LabelOutcome {
        label,
        stats: features.stats,
        st_offset: features.st_offset,
        n_peaks: peaks.len(),
    }
}
