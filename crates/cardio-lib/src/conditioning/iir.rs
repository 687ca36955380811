//! Zero-phase Butterworth band-pass built from cascaded second-order sections.
//!
//! The band-pass is a low-pass at the upper edge followed by a high-pass at the
//! lower edge, each designed from the analog Butterworth prototype through the
//! bilinear transform with frequency pre-warping. `filtfilt` hands the sections
//! to `sci_rs` for the forward-backward pass. Inputs shorter than its edge
//! padding run through a local pass over an odd-extended copy, seeding every
//! section with its steady-state response so the edges do not ring.

use crate::error::ConfigError;
use sci_rs::signal::filter::{design::Sos, sosfiltfilt_dyn};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    Lowpass,
    Highpass,
}

/// Second-order section, `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self { b, a }
    }

    /// Gain at DC.
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a[0] + self.a[1];
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.b[0] + self.b[1] + self.b[2]) / den
    }

    /// Poles inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }

    /// Transposed direct-form II state after settling on a constant input `x`.
    fn steady_state(&self, x: f64) -> [f64; 2] {
        let y = self.dc_gain() * x;
        [y - self.b[0] * x, self.b[2] * x - self.a[1] * y]
    }

    fn run(&self, data: &mut [f64], mut state: [f64; 2]) {
        for sample in data.iter_mut() {
            let x = *sample;
            let y = self.b[0] * x + state[0];
            state[0] = self.b[1] * x - self.a[0] * y + state[1];
            state[1] = self.b[2] * x - self.a[1] * y;
            *sample = y;
        }
    }
}

/// Cascade of biquads forming a Butterworth band-pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Butterworth {
    sections: Vec<Biquad>,
}

impl Butterworth {
    /// Design an order-`order` band-pass between `low_hz` and `high_hz`.
    pub fn bandpass(order: usize, low_hz: f64, high_hz: f64, fs: f64) -> Result<Self, ConfigError> {
        if !(low_hz.is_finite() && high_hz.is_finite()) || low_hz <= 0.0 || low_hz >= high_hz {
            return Err(ConfigError::InvalidBand { low_hz, high_hz });
        }
        let nyquist = fs * 0.5;
        if high_hz >= nyquist {
            return Err(ConfigError::BandAboveNyquist { high_hz, nyquist });
        }
        let order = order.max(1);
        let mut sections = design(order, high_hz, fs, Response::Lowpass);
        sections.extend(design(order, low_hz, fs, Response::Highpass));
        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    fn to_sos(&self) -> Vec<Sos<f64>> {
        self.sections
            .iter()
            .map(|s| Sos::new(s.b, [1.0, s.a[0], s.a[1]]))
            .collect()
    }

    /// Edge padding used by the forward-backward pass: three times the
    /// effective tap count, not counting first-order sections twice.
    pub fn pad_len(&self) -> usize {
        let b_zeros = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let a_zeros = self.sections.iter().filter(|s| s.a[1] == 0.0).count();
        3 * (2 * self.sections.len() + 1 - b_zeros.min(a_zeros))
    }

    /// Single causal pass, seeded with the steady state for `data[0]`.
    pub fn filter(&self, data: &[f64]) -> Vec<f64> {
        let mut out = data.to_vec();
        let Some(&first) = data.first() else {
            return out;
        };
        let mut level = first;
        for section in &self.sections {
            section.run(&mut out, section.steady_state(level));
            level *= section.dc_gain();
        }
        out
    }

    /// Forward-backward (zero-phase) filtering; output length equals input length.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n == 0 {
            return Vec::new();
        }
        if n > self.pad_len() {
            return sosfiltfilt_dyn(data.iter(), &self.to_sos());
        }
        self.filtfilt_short(data)
    }

    fn filtfilt_short(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        let pad = self.pad_len().min(n - 1);
        let extended = odd_extend(data, pad);
        let mut forward = self.filter(&extended);
        forward.reverse();
        let mut backward = self.filter(&forward);
        backward.reverse();
        backward[pad..pad + n].to_vec()
    }
}

/// Band-pass `data` with an order-3 Butterworth, forward and backward.
pub fn bandpass_filtfilt(data: &[f64], low_hz: f64, high_hz: f64, fs: f64) -> Result<Vec<f64>, ConfigError> {
    let filter = Butterworth::bandpass(3, low_hz, high_hz, fs)?;
    Ok(filter.filtfilt(data))
}

fn odd_extend(data: &[f64], pad: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - data[i]));
    out.extend_from_slice(data);
    out.extend((1..=pad).map(|i| 2.0 * last - data[n - 1 - i]));
    out
}

fn prewarp(freq_hz: f64, fs: f64) -> f64 {
    2.0 * fs * (PI * freq_hz / fs).tan()
}

fn design(order: usize, cutoff_hz: f64, fs: f64, response: Response) -> Vec<Biquad> {
    let wc = prewarp(cutoff_hz, fs);
    let k = 2.0 * fs;
    let mut sections = Vec::with_capacity(order / 2 + 1);
    // Upper half-plane poles; the conjugates are implied by each section.
    for idx in 0..order / 2 {
        let theta = PI * (2 * idx + order + 1) as f64 / (2 * order) as f64;
        let (re, im) = (theta.cos() * wc, theta.sin() * wc);
        sections.push(bilinear_pair(re, re * re + im * im, k, response));
    }
    if order % 2 == 1 {
        sections.push(bilinear_real(-wc, k, response));
    }
    sections
}

fn bilinear_real(p: f64, k: f64, response: Response) -> Biquad {
    let alpha = k - p;
    let a1 = -(k + p) / alpha;
    match response {
        Response::Lowpass => Biquad::new([-p / alpha, -p / alpha, 0.0], [a1, 0.0]),
        Response::Highpass => Biquad::new([k / alpha, -k / alpha, 0.0], [a1, 0.0]),
    }
}

fn bilinear_pair(p_re: f64, p_mag_sq: f64, k: f64, response: Response) -> Biquad {
    let k2 = k * k;
    let d = k2 - 2.0 * k * p_re + p_mag_sq;
    let a = [2.0 * (p_mag_sq - k2) / d, (k2 + 2.0 * k * p_re + p_mag_sq) / d];
    match response {
        Response::Lowpass => Biquad::new([p_mag_sq / d, 2.0 * p_mag_sq / d, p_mag_sq / d], a),
        Response::Highpass => Biquad::new([k2 / d, -2.0 * k2 / d, k2 / d], a),
    }
}
