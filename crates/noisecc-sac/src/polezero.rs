//! SAC pole-zero instrument response files and water-level deconvolution.

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use num_complex::Complex;

use crate::dsp;
use crate::errors::SacError;
use crate::trace::Trace;

#[derive(Debug, Clone, PartialEq)]
pub struct PoleZero {
    pub zeros: Vec<Complex<f64>>,
    pub poles: Vec<Complex<f64>>,
    pub constant: f64,
}

impl PoleZero {
    /// Parse the classic SAC_PZs text layout: `ZEROS n` / `POLES n` each
    /// followed by up to n `re im` lines (omitted entries default to the
    /// origin), plus `CONSTANT c`. `*`-prefixed lines are comments.
    pub fn parse(content: &str) -> Result<Self, SacError> {
        let mut zeros: Vec<Complex<f64>> = Vec::new();
        let mut poles: Vec<Complex<f64>> = Vec::new();
        let mut constant = 1.0;
        let mut pending: Option<(&'static str, usize)> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('*') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let keyword = fields[0].to_ascii_uppercase();
            match keyword.as_str() {
                "ZEROS" | "POLES" => {
                    let count: usize = fields
                        .get(1)
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| SacError::PoleZero(format!("bad count in '{line}'")))?;
                    let which = if keyword == "ZEROS" { "zeros" } else { "poles" };
                    let target = if which == "zeros" { &mut zeros } else { &mut poles };
                    target.clear();
                    target.resize(count, Complex::new(0.0, 0.0));
                    pending = Some((which, 0));
                }
                "CONSTANT" => {
                    constant = fields
                        .get(1)
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| SacError::PoleZero(format!("bad constant in '{line}'")))?;
                    pending = None;
                }
                _ => {
                    let (which, index) = pending.ok_or_else(|| {
                        SacError::PoleZero(format!("unexpected line '{line}'"))
                    })?;
                    if fields.len() != 2 {
                        return Err(SacError::PoleZero(format!("bad pole/zero line '{line}'")));
                    }
                    let re: f64 = fields[0]
                        .parse()
                        .map_err(|_| SacError::PoleZero(format!("bad number in '{line}'")))?;
                    let im: f64 = fields[1]
                        .parse()
                        .map_err(|_| SacError::PoleZero(format!("bad number in '{line}'")))?;
                    let target = if which == "zeros" { &mut zeros } else { &mut poles };
                    if index >= target.len() {
                        return Err(SacError::PoleZero(format!(
                            "more {which} listed than declared"
                        )));
                    }
                    target[index] = Complex::new(re, im);
                    pending = Some((which, index + 1));
                }
            }
        }

        Ok(Self {
            zeros,
            poles,
            constant,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SacError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Transfer function at frequency `freq_hz`, evaluated at s = i 2 pi f.
    pub fn evaluate(&self, freq_hz: f64) -> Complex<f64> {
        let s = Complex::new(0.0, 2.0 * PI * freq_hz);
        let mut value = Complex::new(self.constant, 0.0);
        for zero in &self.zeros {
            value *= s - zero;
        }
        for pole in &self.poles {
            value /= s - pole;
        }
        value
    }
}

/// Four-corner cosine taper used as the deconvolution frequency limit:
/// zero below f1 and above f4, unity between f2 and f3.
fn freq_limit_taper(freq: f64, limits: [f64; 4]) -> f64 {
    let [f1, f2, f3, f4] = limits;
    if freq <= f1 || freq >= f4 {
        0.0
    } else if freq < f2 {
        0.5 * (1.0 - (PI * (freq - f1) / (f2 - f1)).cos())
    } else if freq <= f3 {
        1.0
    } else {
        0.5 * (1.0 + (PI * (freq - f3) / (f4 - f3)).cos())
    }
}

/// Remove the instrument response in place. The spectrum is divided by the
/// response with a water level `water_level_db` below its peak magnitude,
/// inside the `freq_limits` taper.
pub fn remove_response(
    trace: &mut Trace,
    response: &PoleZero,
    freq_limits: [f64; 4],
    water_level_db: f64,
) -> Result<(), SacError> {
    if !(freq_limits[0] < freq_limits[1]
        && freq_limits[1] < freq_limits[2]
        && freq_limits[2] < freq_limits[3])
    {
        return Err(SacError::PoleZero(format!(
            "freq limits must increase, got {freq_limits:?}"
        )));
    }
    let n = trace.data.len();
    if n < 2 {
        return Ok(());
    }

    let df = 1.0 / (n as f64 * trace.header.delta);
    let half = n / 2;
    let mut gains = vec![Complex::new(0.0, 0.0); half + 1];
    let mut peak: f64 = 0.0;
    for (k, slot) in gains.iter_mut().enumerate() {
        let h = response.evaluate(k as f64 * df);
        peak = peak.max(h.norm());
        *slot = h;
    }
    if peak == 0.0 {
        return Err(SacError::PoleZero("response is identically zero".into()));
    }
    let floor = peak * 10f64.powf(-water_level_db / 20.0);
    let floor_sq = floor * floor;

    dsp::apply_spectral_complex(trace, |k_freq| {
        let k = (k_freq / df).round() as usize;
        let h = gains[k.min(half)];
        let denom = h.norm_sqr().max(floor_sq);
        h.conj() / denom * freq_limit_taper(k_freq, freq_limits)
    });
    Ok(())
}
