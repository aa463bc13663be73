//! Trace-domain signal processing primitives. Spectral operations share one
//! helper that runs a forward transform, edits the positive-frequency bins,
//! mirrors them, and inverts.

use std::f64::consts::PI;

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::errors::SacError;
use crate::trace::Trace;

pub fn demean(trace: &mut Trace) {
    if trace.data.is_empty() {
        return;
    }
    let mean = trace.data.iter().sum::<f64>() / trace.data.len() as f64;
    for sample in &mut trace.data {
        *sample -= mean;
    }
}

/// Least-squares straight-line removal.
pub fn detrend_linear(trace: &mut Trace) {
    let n = trace.data.len();
    if n < 2 {
        demean(trace);
        return;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = trace.data.iter().sum::<f64>() / n_f;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in trace.data.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    for (i, sample) in trace.data.iter_mut().enumerate() {
        *sample -= y_mean + slope * (i as f64 - x_mean);
    }
}

/// Hann taper over `width` of the trace length at each end, 0 < width <= 0.5.
pub fn taper_hann(trace: &mut Trace, width: f64) {
    let n = trace.data.len();
    let ramp = ((n as f64) * width).round() as usize;
    if ramp < 2 || n < 2 * ramp {
        return;
    }
    for i in 0..ramp {
        let w = 0.5 * (1.0 - (PI * i as f64 / ramp as f64).cos());
        trace.data[i] *= w;
        trace.data[n - 1 - i] *= w;
    }
}

fn forward(data: &[f64]) -> Vec<Complex<f64>> {
    let mut buf: Vec<Complex<f64>> = data.iter().map(|&x| Complex::new(x, 0.0)).collect();
    FftPlanner::new().plan_fft_forward(buf.len()).process(&mut buf);
    buf
}

fn inverse(mut buf: Vec<Complex<f64>>) -> Vec<f64> {
    let n = buf.len();
    FftPlanner::new().plan_fft_inverse(n).process(&mut buf);
    buf.into_iter().map(|z| z.re / n as f64).collect()
}

/// Apply a real gain to each spectral bin. `gain(f)` is evaluated for the
/// non-negative frequencies and mirrored onto the negative half so the
/// output stays real; the result is zero-phase.
pub fn apply_spectral_gain(trace: &mut Trace, gain: impl Fn(f64) -> f64) {
    let n = trace.data.len();
    if n < 2 {
        return;
    }
    let mut spectrum = forward(&trace.data);
    let df = 1.0 / (n as f64 * trace.header.delta);
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let freq = if k <= n / 2 { k as f64 } else { (n - k) as f64 } * df;
        *bin *= gain(freq);
    }
    trace.data = inverse(spectrum);
}

/// Complex-gain variant of [`apply_spectral_gain`]; the negative-frequency
/// half gets the conjugate gain so the inverse transform stays real.
pub fn apply_spectral_complex(trace: &mut Trace, gain: impl Fn(f64) -> Complex<f64>) {
    let n = trace.data.len();
    if n < 2 {
        return;
    }
    let mut spectrum = forward(&trace.data);
    let df = 1.0 / (n as f64 * trace.header.delta);
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if k <= n / 2 {
            *bin *= gain(k as f64 * df);
        } else {
            *bin *= gain((n - k) as f64 * df).conj();
        }
    }
    trace.data = inverse(spectrum);
}

/// Zero-phase Butterworth band-pass magnitude response. `passes = 2` squares
/// the response, mirroring a forward-and-reverse recursive filter.
pub fn bandpass(trace: &mut Trace, low_hz: f64, high_hz: f64, poles: u32, passes: u32) {
    let order = 2.0 * poles as f64;
    apply_spectral_gain(trace, |f| {
        if f <= 0.0 {
            return 0.0;
        }
        let hp = 1.0 / (1.0 + (low_hz / f).powf(order)).sqrt();
        let lp = 1.0 / (1.0 + (f / high_hz).powf(order)).sqrt();
        (hp * lp).powi(passes as i32)
    });
}

/// Decimate by an integer factor: low-pass below the new Nyquist (cosine
/// rolloff from 80% of it), then keep every `factor`-th sample.
pub fn decimate(trace: &mut Trace, factor: usize) -> Result<(), SacError> {
    if factor == 0 {
        return Err(SacError::Mismatch("decimation factor must be >= 1".into()));
    }
    if factor == 1 {
        return Ok(());
    }
    let new_nyquist = 1.0 / (2.0 * trace.header.delta * factor as f64);
    let rolloff = 0.8 * new_nyquist;
    apply_spectral_gain(trace, |f| {
        if f <= rolloff {
            1.0
        } else if f >= new_nyquist {
            0.0
        } else {
            0.5 * (1.0 + (PI * (f - rolloff) / (new_nyquist - rolloff)).cos())
        }
    });
    trace.data = trace.data.iter().copied().step_by(factor).collect();
    trace.header.delta *= factor as f64;
    Ok(())
}

/// Full linear cross-correlation of two equal-length traces,
/// `cc[k] = sum_i a[i] * b[i + k]` for lags `k` in `[-(n-1), n-1]`.
/// The output begin offset is `-(n-1) * delta`. With `normalized` the result
/// is divided by the geometric mean of the zero-lag autocorrelations.
/// `max_lag_s` truncates the lag axis symmetrically.
pub fn correlate(
    a: &Trace,
    b: &Trace,
    normalized: bool,
    max_lag_s: Option<f64>,
) -> Result<Trace, SacError> {
    let n = a.data.len();
    if n == 0 || b.data.len() != n {
        return Err(SacError::Mismatch(format!(
            "correlation inputs have {} and {} samples",
            n,
            b.data.len()
        )));
    }
    if (a.header.delta - b.header.delta).abs() > a.header.delta * 1e-6 {
        return Err(SacError::Mismatch(
            "correlation inputs have different sample spacing".into(),
        ));
    }

    let size = (2 * n - 1).next_power_of_two();
    let mut fa: Vec<Complex<f64>> = a
        .data
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(size)
        .collect();
    let mut fb = fa.clone();
    for (slot, &x) in fb.iter_mut().zip(b.data.iter()) {
        *slot = Complex::new(x, 0.0);
    }
    for slot in fb.iter_mut().skip(n) {
        *slot = Complex::new(0.0, 0.0);
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    fft.process(&mut fa);
    fft.process(&mut fb);
    let mut cross: Vec<Complex<f64>> = fa
        .iter()
        .zip(fb.iter())
        .map(|(x, y)| x.conj() * y)
        .collect();
    planner.plan_fft_inverse(size).process(&mut cross);

    // Circular index `size - k` holds lag -k; unwrap to a linear lag axis.
    let mut cc = Vec::with_capacity(2 * n - 1);
    for lag in -(n as i64 - 1)..=(n as i64 - 1) {
        let idx = lag.rem_euclid(size as i64) as usize;
        cc.push(cross[idx].re / size as f64);
    }

    if normalized {
        let energy_a: f64 = a.data.iter().map(|x| x * x).sum();
        let energy_b: f64 = b.data.iter().map(|x| x * x).sum();
        let norm = (energy_a * energy_b).sqrt();
        if norm > 0.0 {
            for value in &mut cc {
                *value /= norm;
            }
        }
    }

    let mut header = a.header.clone();
    header.b = -((n - 1) as f64) * a.header.delta;
    let mut out = Trace::new(header, cc);
    if let Some(max_lag) = max_lag_s {
        if max_lag > 0.0 && max_lag < out.e() {
            out = out.cut(-max_lag, max_lag + out.header.delta)?;
        }
    }
    Ok(out)
}

/// Rotate north/east components into radial/transverse for the given
/// back-azimuth (degrees, station -> event).
pub fn rotate_ne_to_rt(north: &[f64], east: &[f64], baz_deg: f64) -> (Vec<f64>, Vec<f64>) {
    let ba = baz_deg.to_radians();
    let (sin_ba, cos_ba) = (ba.sin(), ba.cos());
    let radial = north
        .iter()
        .zip(east.iter())
        .map(|(&n, &e)| -e * sin_ba - n * cos_ba)
        .collect();
    let transverse = north
        .iter()
        .zip(east.iter())
        .map(|(&n, &e)| -e * cos_ba + n * sin_ba)
        .collect();
    (radial, transverse)
}

/// Fold the trace onto itself: reverse, add, halve. Idempotent.
pub fn symmetrize(trace: &mut Trace) {
    let n = trace.data.len();
    for i in 0..n / 2 {
        let folded = (trace.data[i] + trace.data[n - 1 - i]) / 2.0;
        trace.data[i] = folded;
        trace.data[n - 1 - i] = folded;
    }
}

/// One-bit temporal normalization: keep only the sign of each sample.
pub fn one_bit(trace: &mut Trace) {
    for sample in &mut trace.data {
        *sample = if *sample > 0.0 {
            1.0
        } else if *sample < 0.0 {
            -1.0
        } else {
            0.0
        };
    }
}

/// Running-absolute-mean normalization with a centered window of
/// `half_width` samples to each side. Quiet stretches are floored at a
/// small fraction of the loudest window so spikes get suppressed without
/// blowing up silence.
pub fn running_abs_mean(trace: &mut Trace, half_width: usize) {
    let n = trace.data.len();
    if n == 0 {
        return;
    }
    let mut weights = vec![0.0; n];
    for i in 0..n {
        let lo = i.saturating_sub(half_width);
        let hi = (i + half_width + 1).min(n);
        let sum: f64 = trace.data[lo..hi].iter().map(|x| x.abs()).sum();
        weights[i] = sum / (hi - lo) as f64;
    }
    let peak = weights.iter().cloned().fold(0.0f64, f64::max);
    if peak == 0.0 {
        return;
    }
    let floor = peak * 1e-8;
    for (sample, weight) in trace.data.iter_mut().zip(weights.iter()) {
        *sample /= weight.max(floor);
    }
}

/// Spectral whitening: flatten the amplitude spectrum inside `[low_hz,
/// high_hz]` (cosine ramps over a tenth of the band at each edge) and zero
/// it outside.
pub fn whiten(trace: &mut Trace, low_hz: f64, high_hz: f64) {
    let n = trace.data.len();
    if n < 2 {
        return;
    }
    let mut spectrum = forward(&trace.data);
    let df = 1.0 / (n as f64 * trace.header.delta);
    let ramp = 0.1 * (high_hz - low_hz);
    let peak = spectrum.iter().map(|z| z.norm()).fold(0.0f64, f64::max);
    if peak == 0.0 {
        return;
    }
    let floor = peak * 1e-12;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let freq = if k <= n / 2 { k as f64 } else { (n - k) as f64 } * df;
        let taper = if freq < low_hz || freq > high_hz {
            0.0
        } else if freq < low_hz + ramp {
            0.5 * (1.0 - (PI * (freq - low_hz) / ramp).cos())
        } else if freq > high_hz - ramp {
            0.5 * (1.0 + (PI * (freq - (high_hz - ramp)) / ramp).cos())
        } else {
            1.0
        };
        let amp = bin.norm().max(floor);
        *bin = *bin / amp * taper;
    }
    trace.data = inverse(spectrum);
}

/// Sample-wise accumulation onto `dest`; lengths must match.
pub fn add_into(dest: &mut Trace, src: &Trace) -> Result<(), SacError> {
    if dest.data.len() != src.data.len() {
        return Err(SacError::Mismatch(format!(
            "cannot stack {} samples onto {}",
            src.data.len(),
            dest.data.len()
        )));
    }
    for (acc, &value) in dest.data.iter_mut().zip(src.data.iter()) {
        *acc += value;
    }
    Ok(())
}
