//! Deterministic synthetic single-lead waveforms for the four archetypes.
//!
//! A 1 Hz sinusoid stands in for baseline rhythm, 3-sample bursts approximate
//! QRS complexes, and additive artifact layers (baseline wander, powerline,
//! muscle noise, white floor) make the output look like a real recording.
//! All randomness comes from the caller's `Rng`, so a seeded generator gives
//! reproducible signals.

use crate::error::ConfigError;
use crate::signal::{validate_rate, Signal};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const REGULAR_BURST: [f64; 3] = [0.8, 1.2, 0.6];
const IRREGULAR_BURST: [f64; 3] = [0.6, 1.0, 0.4];

/// Wander ceiling for [`add_baseline_wander`] when used as an augmentation step.
pub const DEFAULT_WANDER_MAX_AMPLITUDE: f64 = 0.5;

/// Synthetic waveform class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Normal,
    StElevation,
    Afib,
    Tachy,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::Normal,
        Archetype::StElevation,
        Archetype::Afib,
        Archetype::Tachy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Normal => "normal",
            Archetype::StElevation => "st_elevation",
            Archetype::Afib => "afib",
            Archetype::Tachy => "tachy",
        }
    }

    /// Seconds between regular bursts.
    fn beat_period_s(&self) -> f64 {
        match self {
            Archetype::Tachy => 0.5,
            _ => 0.8,
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Archetype::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown archetype '{}'; expected one of normal, st_elevation, afib, tachy",
                    s
                )
            })
    }
}

/// Amplitudes of the rhythm and artifact layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Amplitude of the 1 Hz base sinusoid.
    pub base_amplitude: f64,
    /// Peak-to-peak ceiling for baseline wander (actual amplitude is half).
    pub wander_max_amplitude: f64,
    pub powerline_amplitude: f64,
    pub muscle_amplitude: f64,
    pub noise_floor: f64,
    /// Sustained offset added to the second half of `st_elevation` signals.
    pub st_offset: f64,
    /// Per-sample jitter on the sustained offset.
    pub st_jitter: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            base_amplitude: 0.2,
            wander_max_amplitude: 0.3,
            powerline_amplitude: 0.02,
            muscle_amplitude: 0.03,
            noise_floor: 0.01,
            st_offset: 1.0,
            st_jitter: 0.2,
        }
    }
}

/// Generate `duration_s` seconds of the given archetype at `fs` Hz.
pub fn generate<R: Rng + ?Sized>(
    duration_s: f64,
    fs: f64,
    archetype: Archetype,
    rng: &mut R,
) -> Result<Signal, ConfigError> {
    generate_with_config(duration_s, fs, archetype, &SynthConfig::default(), rng)
}

pub fn generate_with_config<R: Rng + ?Sized>(
    duration_s: f64,
    fs: f64,
    archetype: Archetype,
    cfg: &SynthConfig,
    rng: &mut R,
) -> Result<Signal, ConfigError> {
    validate_rate(fs)?;
    if !duration_s.is_finite() || duration_s <= 0.0 {
        return Err(ConfigError::InvalidDuration(duration_s));
    }
    let n = (duration_s * fs).floor() as usize;
    let mut data: Vec<f64> = (0..n)
        .map(|i| cfg.base_amplitude * (2.0 * PI * i as f64 / fs).sin())
        .collect();

    match archetype {
        Archetype::Afib => inject_irregular_beats(&mut data, fs, rng),
        _ => {
            let period = ((fs * archetype.beat_period_s()).floor() as usize).max(1);
            inject_regular_beats(&mut data, period);
        }
    }

    if archetype == Archetype::StElevation {
        let half = n / 2;
        for sample in &mut data[half..] {
            let jitter: f64 = rng.sample(StandardNormal);
            *sample += cfg.st_offset + cfg.st_jitter * jitter;
        }
    }

    apply_baseline_wander(&mut data, fs, cfg.wander_max_amplitude, rng);
    apply_powerline(&mut data, fs, cfg.powerline_amplitude);
    apply_white_noise(&mut data, cfg.muscle_amplitude, rng);
    apply_white_noise(&mut data, cfg.noise_floor, rng);

    Signal::new(data, format!("synthetic:{}", archetype)).with_rate(fs)
}

fn inject_burst(data: &mut [f64], pos: usize, shape: [f64; 3], scale: f64) {
    if pos + 3 < data.len() {
        for (sample, weight) in data[pos..pos + 3].iter_mut().zip(shape) {
            *sample += weight * scale;
        }
    }
}

fn inject_regular_beats(data: &mut [f64], period: usize) {
    for pos in (0..data.len()).step_by(period) {
        inject_burst(data, pos, REGULAR_BURST, 1.0);
    }
}

fn inject_irregular_beats<R: Rng + ?Sized>(data: &mut [f64], fs: f64, rng: &mut R) {
    let min_gap = ((0.4 * fs).floor() as usize).max(1);
    let max_gap = ((1.4 * fs).floor() as usize).max(min_gap + 1);
    let mut pos = 0;
    while pos < data.len() {
        let gap = rng.gen_range(min_gap..max_gap);
        let amp = rng.gen_range(0.6..1.2);
        inject_burst(data, pos, IRREGULAR_BURST, amp);
        pos += gap;
    }
}

fn apply_baseline_wander<R: Rng + ?Sized>(data: &mut [f64], fs: f64, max_amplitude: f64, rng: &mut R) {
    let freq = rng.gen_range(0.1..0.3);
    let amplitude = 0.5 * max_amplitude;
    for (i, sample) in data.iter_mut().enumerate() {
        *sample += amplitude * (2.0 * PI * freq * i as f64 / fs).sin();
    }
}

fn apply_powerline(data: &mut [f64], fs: f64, amplitude: f64) {
    let freq = powerline_frequency(fs);
    for (i, sample) in data.iter_mut().enumerate() {
        *sample += amplitude * (2.0 * PI * freq * i as f64 / fs).sin();
    }
}

fn apply_white_noise<R: Rng + ?Sized>(data: &mut [f64], amplitude: f64, rng: &mut R) {
    for sample in data.iter_mut() {
        let z: f64 = rng.sample(StandardNormal);
        *sample += amplitude * z;
    }
}

/// Mains frequency assumed for a recording: 50 Hz at 250 Hz sampling and above, else 60 Hz.
pub fn powerline_frequency(fs: f64) -> f64 {
    if fs >= 250.0 {
        50.0
    } else {
        60.0
    }
}

/// Add a slow sinusoidal drift (0.1-0.3 Hz) of amplitude `max_amplitude / 2`.
pub fn add_baseline_wander<R: Rng + ?Sized>(
    samples: &[f64],
    fs: f64,
    max_amplitude: f64,
    rng: &mut R,
) -> Vec<f64> {
    let mut out = samples.to_vec();
    apply_baseline_wander(&mut out, fs, max_amplitude, rng);
    out
}

/// Add mains interference (see [`powerline_frequency`]).
pub fn add_powerline_noise(samples: &[f64], fs: f64, amplitude: f64) -> Vec<f64> {
    let mut out = samples.to_vec();
    apply_powerline(&mut out, fs, amplitude);
    out
}

/// Add white Gaussian noise with standard deviation `amplitude`.
pub fn add_muscle_noise<R: Rng + ?Sized>(samples: &[f64], amplitude: f64, rng: &mut R) -> Vec<f64> {
    let mut out = samples.to_vec();
    apply_white_noise(&mut out, amplitude, rng);
    out
}
