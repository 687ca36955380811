use crate::error::ConfigError;
use realfft::RealFftPlanner;

/// Frequency-domain band-pass: zero every real-FFT bin outside `[low_hz, high_hz]`
/// and transform back. Approximate (brick-wall, circular) but length-preserving.
pub fn bandpass_mask(data: &[f64], low_hz: f64, high_hz: f64, fs: f64) -> Result<Vec<f64>, ConfigError> {
    if !(low_hz.is_finite() && high_hz.is_finite()) || low_hz < 0.0 || low_hz >= high_hz {
        return Err(ConfigError::InvalidBand { low_hz, high_hz });
    }
    let n = data.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let c2r = planner.plan_fft_inverse(n);

    let mut frame = data.to_vec();
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut frame, &mut spectrum)
        .expect("buffers sized by the planner");

    let bin_hz = fs / n as f64;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let freq = k as f64 * bin_hz;
        if freq < low_hz || freq > high_hz {
            bin.re = 0.0;
            bin.im = 0.0;
        }
    }
    // The inverse transform requires purely real DC and Nyquist bins.
    spectrum[0].im = 0.0;
    if n % 2 == 0 {
        if let Some(last) = spectrum.last_mut() {
            last.im = 0.0;
        }
    }

    let mut out = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut out)
        .expect("buffers sized by the planner");
    let scale = 1.0 / n as f64;
    out.iter_mut().for_each(|x| *x *= scale);
    Ok(out)
}
