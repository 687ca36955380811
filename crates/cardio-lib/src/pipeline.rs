use crate::conditioning::{condition, window};
use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::labeler::{label, LabelOutcome};
use crate::signal::{mean, std_dev, Label, Window};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome for one fixed-length window of a longer recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledWindow {
    pub index: usize,
    pub start: usize,
    pub len: usize,
    pub outcome: LabelOutcome,
}

impl LabeledWindow {
    pub fn label(&self) -> Label {
        self.outcome.label
    }
}

/// Window `samples` and label each window against whole-signal statistics.
pub fn auto_label(samples: &[f64], fs: f64, cfg: &PipelineConfig) -> Result<Vec<LabeledWindow>, ConfigError> {
    let windows = window(samples, fs, cfg.window_seconds)?;
    let global_mean = mean(samples);
    let global_std = std_dev(samples);

    let label_one = |(index, w): (usize, &Window<'_>)| LabeledWindow {
        index,
        start: w.start,
        len: w.len(),
        outcome: label(w.samples, fs, global_mean, global_std, &cfg.labeler),
    };

    #[cfg(feature = "parallel")]
    let labeled: Vec<LabeledWindow> = windows.par_iter().enumerate().map(label_one).collect();
    #[cfg(not(feature = "parallel"))]
    let labeled: Vec<LabeledWindow> = windows.iter().enumerate().map(label_one).collect();

    info!(
        "labeled {} windows of {} s: {:?}",
        labeled.len(),
        cfg.window_seconds,
        summarize(&labeled)
    );
    Ok(labeled)
}

/// Band-pass and normalize first, then [`auto_label`].
pub fn condition_and_label(
    samples: &[f64],
    fs: f64,
    cfg: &PipelineConfig,
) -> Result<Vec<LabeledWindow>, ConfigError> {
    let conditioned = condition(samples, fs, &cfg.conditioning)?;
    auto_label(&conditioned, fs, cfg)
}

/// Window count per label.
pub fn summarize(labeled: &[LabeledWindow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for w in labeled {
        *counts.entry(w.label().to_string()).or_insert(0) += 1;
    }
    counts
}
