//! Spectral analysis of triaxial acceleration windows.
//!
//! Each axis is demeaned, transformed with a complex FFT and reported as `|FFT[i]| / fs`
//! for every bin of the transform (the full two-sided length). An optional cepstral
//! smoothing pass produces an envelope alongside the raw magnitudes.
//!
//! # Example
//!
//! ```
//! use shm_daq::data::fft::SpectralAnalyzer;
//!
//! let fs = 62.5;
//! let n = 256;
//! let tone: Vec<f64> = (0..n)
//!     .map(|i| (2.0 * std::f64::consts::PI * 5.0 * i as f64 / fs).sin())
//!     .collect();
//! let flat = vec![0.0; n];
//!
//! let analyzer = SpectralAnalyzer::new(n, fs).unwrap();
//! let spectrum = analyzer.analyze(&tone, &flat, &flat).unwrap();
//! let peak = shm_daq::data::fft::peak(&spectrum, 0).unwrap();
//! assert!((peak.frequency_hz - 5.0).abs() <= fs / n as f64);
//! ```

use crate::error::{AppResult, DaqError};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::Serialize;
use std::sync::Arc;

/// Smallest magnitude fed to `log10` during cepstral smoothing.
pub const MAGNITUDE_FLOOR: f64 = 1e-12;

/// One frequency bin of a three-axis spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectrumBin {
    /// Center frequency of the bin in Hz.
    pub frequency_hz: f64,
    /// `|FFT| / fs` of the X (or NS) axis.
    pub amp_x: f64,
    /// `|FFT| / fs` of the Y (or EW) axis.
    pub amp_y: f64,
    /// `|FFT| / fs` of the Z (or UD) axis.
    pub amp_z: f64,
}

impl SpectrumBin {
    /// Amplitude of axis `axis` (0 = X, 1 = Y, 2 = Z).
    #[must_use]
    pub fn amp(&self, axis: usize) -> f64 {
        match axis {
            0 => self.amp_x,
            1 => self.amp_y,
            _ => self.amp_z,
        }
    }
}

/// Raw spectrum together with its cepstrally smoothed envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmoothedSpectrum {
    /// Unsmoothed magnitudes, as returned by [`SpectralAnalyzer::analyze`].
    pub raw: Vec<SpectrumBin>,
    /// Liftered envelope on the same scale as `raw`.
    pub envelope: Vec<SpectrumBin>,
}

/// Forward and inverse plans for one transform length.
#[derive(Clone)]
pub(crate) struct FftPair {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl FftPair {
    pub(crate) fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    /// Forward transform of a real signal.
    pub(crate) fn forward(&self, signal: &[f64]) -> Vec<Complex<f64>> {
        let mut buffer: Vec<Complex<f64>> =
            signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.forward.process(&mut buffer);
        buffer
    }

    /// Inverse transform scaled by `1/N`, keeping the real part.
    pub(crate) fn inverse_real(&self, mut spectrum: Vec<Complex<f64>>) -> Vec<f64> {
        self.inverse.process(&mut spectrum);
        let scale = 1.0 / self.len as f64;
        spectrum.iter().map(|c| c.re * scale).collect()
    }
}

/// Subtract the arithmetic mean. An empty slice stays empty.
#[must_use]
pub fn demean(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    signal.iter().map(|v| v - mean).collect()
}

/// Check that all three axes have exactly `expected` samples.
pub(crate) fn check_lengths(expected: usize, axes: [&[f64]; 3]) -> AppResult<()> {
    for axis in axes {
        if axis.len() != expected {
            return Err(DaqError::WindowLengthMismatch {
                expected,
                actual: axis.len(),
            });
        }
    }
    Ok(())
}

/// Magnitude spectrum calculator for a fixed window length and sample rate.
///
/// Plans are built once in [`SpectralAnalyzer::new`]; `analyze` only borrows `self`, so one
/// analyzer can be shared across threads.
#[derive(Clone)]
pub struct SpectralAnalyzer {
    window_len: usize,
    sample_rate_hz: f64,
    fft: FftPair,
}

impl SpectralAnalyzer {
    /// Create an analyzer for `window_len` samples per axis at `sample_rate_hz`.
    pub fn new(window_len: usize, sample_rate_hz: f64) -> AppResult<Self> {
        if window_len == 0 {
            return Err(DaqError::Configuration(
                "spectral window length must be positive".to_string(),
            ));
        }
        if !(sample_rate_hz > 0.0 && sample_rate_hz.is_finite()) {
            return Err(DaqError::Configuration(format!(
                "invalid sample rate {sample_rate_hz} Hz"
            )));
        }
        Ok(Self {
            window_len,
            sample_rate_hz,
            fft: FftPair::new(window_len),
        })
    }

    /// Samples per axis.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Sample rate in Hz.
    #[must_use]
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Frequency of bin `i`.
    #[must_use]
    pub fn bin_frequency(&self, i: usize) -> f64 {
        i as f64 * self.sample_rate_hz / self.window_len as f64
    }

    /// Magnitude spectrum of a three-axis window.
    pub fn analyze(&self, x: &[f64], y: &[f64], z: &[f64]) -> AppResult<Vec<SpectrumBin>> {
        let [fx, fy, fz] = self.transform_axes(x, y, z)?;
        let fs = self.sample_rate_hz;
        Ok(self.bins(|i| [fx[i].norm() / fs, fy[i].norm() / fs, fz[i].norm() / fs]))
    }

    /// Magnitude spectrum plus a cepstrally smoothed envelope.
    ///
    /// Quefrency coefficients with index in `(cep_coeff, N - cep_coeff + 1)` are zeroed
    /// before transforming back. The envelope shares the scale of the raw magnitudes.
    pub fn analyze_smoothed(
        &self,
        x: &[f64],
        y: &[f64],
        z: &[f64],
        cep_coeff: usize,
    ) -> AppResult<SmoothedSpectrum> {
        let [fx, fy, fz] = self.transform_axes(x, y, z)?;
        let fs = self.sample_rate_hz;
        let raw = self.bins(|i| [fx[i].norm() / fs, fy[i].norm() / fs, fz[i].norm() / fs]);
        let [sx, sy, sz] = [&fx, &fy, &fz].map(|f| self.lifter(f, cep_coeff));
        let envelope = self.bins(|i| [sx[i] / fs, sy[i] / fs, sz[i] / fs]);
        Ok(SmoothedSpectrum { raw, envelope })
    }

    fn transform_axes(&self, x: &[f64], y: &[f64], z: &[f64]) -> AppResult<[Vec<Complex<f64>>; 3]> {
        check_lengths(self.window_len, [x, y, z])?;
        Ok([x, y, z].map(|axis| self.fft.forward(&demean(axis))))
    }

    fn bins(&self, amps: impl Fn(usize) -> [f64; 3]) -> Vec<SpectrumBin> {
        (0..self.window_len)
            .map(|i| {
                let [amp_x, amp_y, amp_z] = amps(i);
                SpectrumBin {
                    frequency_hz: self.bin_frequency(i),
                    amp_x,
                    amp_y,
                    amp_z,
                }
            })
            .collect()
    }

    /// Smoothed `|FFT|` of one axis via the real cepstrum.
    ///
    /// The forward transform of the liftered cepstrum is the smoothed dB curve, so its
    /// real part is mapped back with `10^(re/20)`. Taking the modulus instead would fold
    /// every bin below 0 dB (`|FFT| < 1`) onto its reciprocal.
    fn lifter(&self, spectrum: &[Complex<f64>], cep_coeff: usize) -> Vec<f64> {
        let n = self.window_len;
        let log_mag: Vec<f64> = spectrum
            .iter()
            .map(|c| 20.0 * c.norm().max(MAGNITUDE_FLOOR).log10())
            .collect();
        let mut cepstrum = self.fft.inverse_real(log_mag.into_iter().map(Complex::from).collect());
        for (i, c) in cepstrum.iter_mut().enumerate() {
            if i > cep_coeff && i + cep_coeff < n + 1 {
                *c = 0.0;
            }
        }
        self.fft
            .forward(&cepstrum)
            .iter()
            .map(|c| 10f64.powf(c.re / 20.0))
            .collect()
    }
}

/// The strongest positive-frequency bin of `axis`, skipping DC.
#[must_use]
pub fn peak(spectrum: &[SpectrumBin], axis: usize) -> Option<&SpectrumBin> {
    let half = spectrum.len() / 2;
    spectrum
        .get(1..=half.min(spectrum.len().saturating_sub(1)))?
        .iter()
        .max_by(|a, b| a.amp(axis).total_cmp(&b.amp(axis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(n: usize, fs: f64, freq: f64, amp: f64, offset: f64) -> Vec<f64> {
        (0..n)
            .map(|i| offset + amp * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(SpectralAnalyzer::new(0, 62.5).is_err());
        assert!(SpectralAnalyzer::new(256, 0.0).is_err());
        assert!(SpectralAnalyzer::new(256, f64::NAN).is_err());
    }

    #[test]
    fn bins_cover_full_length() {
        let a = SpectralAnalyzer::new(8, 8.0).unwrap();
        let zeros = vec![0.0; 8];
        let s = a.analyze(&zeros, &zeros, &zeros).unwrap();
        assert_eq!(s.len(), 8);
        assert_eq!(s[3].frequency_hz, 3.0);
        assert!(s.iter().all(|b| b.amp_x == 0.0));
    }

    #[test]
    fn mean_is_removed() {
        let n = 64;
        let x = tone(n, 62.5, 0.0, 0.0, 1000.0);
        let a = SpectralAnalyzer::new(n, 62.5).unwrap();
        let s = a.analyze(&x, &x, &x).unwrap();
        assert!(s[0].amp_x < 1e-9);
    }

    #[test]
    fn magnitude_scaled_by_sample_rate() {
        let (n, fs) = (64, 16.0);
        // Exactly on bin 4.
        let x = tone(n, fs, 1.0, 2.0, 0.0);
        let zeros = vec![0.0; n];
        let a = SpectralAnalyzer::new(n, fs).unwrap();
        let s = a.analyze(&x, &zeros, &zeros).unwrap();
        // |FFT| of a sine at its bin is amp * N / 2.
        assert!((s[4].amp_x - 2.0 * n as f64 / 2.0 / fs).abs() < 1e-9);
        assert!((s[n - 4].amp_x - s[4].amp_x).abs() < 1e-9);
        assert_eq!(peak(&s, 0).unwrap().frequency_hz, 1.0);
    }

    #[test]
    fn length_mismatch_rejected() {
        let a = SpectralAnalyzer::new(16, 62.5).unwrap();
        let ok = vec![0.0; 16];
        let short = vec![0.0; 15];
        assert!(matches!(
            a.analyze(&ok, &short, &ok),
            Err(DaqError::WindowLengthMismatch {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn full_lifter_reproduces_magnitudes() {
        let (n, fs) = (128, 62.5);
        let x: Vec<f64> = (0..n).map(|i| ((i * 37 % 11) as f64) - 5.0 + (i as f64 * 0.3).sin()).collect();
        let y = tone(n, fs, 3.0, 1.0, 0.0);
        let z = tone(n, fs, 7.0, 0.5, 2.0);
        let a = SpectralAnalyzer::new(n, fs).unwrap();
        let s = a.analyze_smoothed(&x, &y, &z, n).unwrap();
        for i in 1..n {
            let raw = s.raw[i].amp_x;
            let env = s.envelope[i].amp_x;
            assert!((raw - env).abs() <= raw * 1e-6 + 1e-12, "bin {i}: {raw} vs {env}");
        }
    }

    #[test]
    fn short_lifter_gives_finite_envelope() {
        let (n, fs) = (256, 62.5);
        let x = tone(n, fs, 5.0, 10.0, 0.0);
        let zeros = vec![0.0; n];
        let a = SpectralAnalyzer::new(n, fs).unwrap();
        let s = a.analyze_smoothed(&x, &zeros, &zeros, 16).unwrap();
        assert_eq!(s.envelope.len(), n);
        assert!(s
            .envelope
            .iter()
            .all(|b| b.amp_x.is_finite() && b.amp_x > 0.0 && b.amp_z.is_finite()));
    }

    #[test]
    fn envelope_keeps_sub_unity_magnitudes() {
        // Every |FFT| of this window is below 1, i.e. negative in dB.
        let (n, fs) = (64, 62.5);
        let x = tone(n, fs, 3.3, 0.01, 0.0);
        let y = tone(n, fs, 9.1, 0.002, 0.0);
        let a = SpectralAnalyzer::new(n, fs).unwrap();
        let s = a.analyze_smoothed(&x, &y, &x, n).unwrap();
        for i in 1..n {
            for axis in 0..2 {
                let raw = s.raw[i].amp(axis);
                let env = s.envelope[i].amp(axis);
                assert!(raw * fs < 1.0);
                assert!((raw - env).abs() <= raw * 1e-6 + 1e-12, "bin {i}: {raw} vs {env}");
            }
        }
    }
}
