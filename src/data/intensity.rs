//! JMA instrumental seismic intensity.
//!
//! Each axis is demeaned, multiplied in the frequency domain by the JMA weighting filter
//! (period-effect, high-cut and low-cut terms) and transformed back. The filtered vector
//! magnitude is sorted and the value exceeded for `round(0.3 * fs)` samples, i.e. 0.3 s of
//! cumulative duration, is the reference amplitude `a0` in gal. The intensity is
//! `2 log10(a0) + 0.94`.

use super::fft::{check_lengths, demean, FftPair};
use super::shindo::IntensityValue;
use crate::error::{AppResult, DaqError};

/// Cumulative duration, in seconds, that the reference amplitude must be exceeded for.
pub const REFERENCE_DURATION_SECS: f64 = 0.3;

/// Build the JMA filter for `n` samples at `sample_rate_hz`.
///
/// `H[0] = 0`; for `i` in `1..=n/2` with `f = i * fs / n` and `y = f / 10`:
///
/// ```text
/// H[i] = sqrt(1/f)
///      * 1 / sqrt(1 + 0.694y² + 0.241y⁴ + 0.0557y⁶ + 0.009664y⁸ + 0.00134y¹⁰ + 0.000155y¹²)
///      * sqrt(1 - exp(-(2f)³))
/// ```
///
/// mirrored so that `H[n - i] = H[i]`.
#[must_use]
pub fn jma_filter(n: usize, sample_rate_hz: f64) -> Vec<f64> {
    let mut h = vec![0.0; n];
    let duration = n as f64 / sample_rate_hz;
    for i in 1..n / 2 + 1 {
        let f = i as f64 / duration;
        let y = f / 10.0;
        let y2 = y * y;
        let period = (1.0 / f).sqrt();
        let poly = 1.0
            + 0.694 * y2
            + 0.241 * y2.powi(2)
            + 0.0557 * y2.powi(3)
            + 0.009664 * y2.powi(4)
            + 0.00134 * y2.powi(5)
            + 0.000155 * y2.powi(6);
        let high_cut = 1.0 / poly.sqrt();
        let low_cut = (1.0 - (-(2.0 * f).powi(3)).exp()).sqrt();
        let value = period * high_cut * low_cut;
        h[i] = value;
        h[n - i] = value;
    }
    h
}

/// Number of largest samples skipped before picking the reference amplitude.
#[must_use]
pub fn reference_rank(sample_rate_hz: f64) -> usize {
    (REFERENCE_DURATION_SECS * sample_rate_hz).round() as usize
}

/// Intensity calculator for a fixed window length and sample rate.
///
/// The filter is built once per instance; `compute` only borrows `self`.
#[derive(Clone)]
pub struct SeismicIntensityEngine {
    window_len: usize,
    sample_rate_hz: f64,
    filter: Vec<f64>,
    fft: FftPair,
}

impl SeismicIntensityEngine {
    /// Build the engine and its frequency-domain filter.
    ///
    /// The window must hold more samples than the 0.3 s reference rank.
    pub fn new(window_len: usize, sample_rate_hz: f64) -> AppResult<Self> {
        if !(sample_rate_hz > 0.0 && sample_rate_hz.is_finite()) {
            return Err(DaqError::Configuration(format!(
                "invalid sample rate {sample_rate_hz} Hz"
            )));
        }
        let required = reference_rank(sample_rate_hz);
        if window_len <= required {
            return Err(DaqError::InsufficientWindow {
                len: window_len,
                required,
            });
        }
        Ok(Self {
            window_len,
            sample_rate_hz,
            filter: jma_filter(window_len, sample_rate_hz),
            fft: FftPair::new(window_len),
        })
    }

    /// Samples per axis expected by `evaluate`.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// The frequency response applied to every axis.
    #[must_use]
    pub fn filter(&self) -> &[f64] {
        &self.filter
    }

    /// Filtered vector magnitude `sqrt(ax² + ay² + az²)` for every sample of the window.
    pub fn filtered_magnitude(&self, x: &[f64], y: &[f64], z: &[f64]) -> AppResult<Vec<f64>> {
        check_lengths(self.window_len, [x, y, z])?;
        let [ax, ay, az] = [x, y, z].map(|axis| {
            let mut spectrum = self.fft.forward(&demean(axis));
            for (c, h) in spectrum.iter_mut().zip(&self.filter) {
                *c *= *h;
            }
            self.fft.inverse_real(spectrum)
        });
        Ok(ax
            .iter()
            .zip(&ay)
            .zip(&az)
            .map(|((x, y), z)| (x * x + y * y + z * z).sqrt())
            .collect())
    }

    /// Instrumental intensity of a three-axis window in gal.
    pub fn compute(&self, x: &[f64], y: &[f64], z: &[f64]) -> AppResult<f64> {
        let mut magnitude = self.filtered_magnitude(x, y, z)?;
        magnitude.sort_by(f64::total_cmp);

        let rank = reference_rank(self.sample_rate_hz);
        if magnitude.len() <= rank {
            return Err(DaqError::InsufficientWindow {
                len: magnitude.len(),
                required: rank,
            });
        }
        let a0 = magnitude[magnitude.len() - 1 - rank];
        if !(a0 > 0.0 && a0.is_finite()) {
            return Err(DaqError::NonPositiveAmplitude { amplitude: a0 });
        }
        Ok(2.0 * a0.log10() + 0.94)
    }

    /// Intensity plus its shindo class and display color.
    pub fn evaluate(&self, x: &[f64], y: &[f64], z: &[f64]) -> AppResult<IntensityValue> {
        self.compute(x, y, z).map(IntensityValue::classify)
    }
}

/// One-shot intensity computation that builds the filter on the fly.
pub fn jma_intensity(x: &[f64], y: &[f64], z: &[f64], sample_rate_hz: f64) -> AppResult<f64> {
    SeismicIntensityEngine::new(x.len(), sample_rate_hz)?.compute(x, y, z)
}
