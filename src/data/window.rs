//! Fixed-size acceleration window accumulator.
//!
//! Decoded, axis-aligned samples from successive messages are pushed into an
//! [`AccelWindow`] until it holds `window_len` X/Y/Z triplets. The full window is then
//! split into per-axis channels, remapped to the sensor's mounting orientation, and
//! handed to the spectral and intensity pipelines.

use super::fft::{SmoothedSpectrum, SpectralAnalyzer, SpectrumBin};
use super::intensity::SeismicIntensityEngine;
use super::shindo::IntensityValue;
use crate::codec::sample::encode_f32_array;
use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Spacing assumed for the first message of a stream, in milliseconds.
pub const DEFAULT_SAMPLE_SPACING_MILLIS: f64 = 8.0;

/// Which raw axis (0, 1, 2) is mounted north-south, east-west and up-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    /// Raw axis mounted north-south.
    pub ns: usize,
    /// Raw axis mounted east-west.
    pub ew: usize,
    /// Raw axis mounted up-down.
    pub ud: usize,
}

impl Default for Orientation {
    fn default() -> Self {
        Self { ns: 0, ew: 1, ud: 2 }
    }
}

impl Orientation {
    /// Check that the three indices are a permutation of `0..3`.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = [false; 3];
        for (name, idx) in [("ns", self.ns), ("ew", self.ew), ("ud", self.ud)] {
            match seen.get_mut(idx) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => return Err(format!("axis index {idx} assigned twice ({name})")),
                None => return Err(format!("axis index {idx} for {name} out of range 0..3")),
            }
        }
        Ok(())
    }

    /// Reorder raw `[x, y, z]` channels into `[ns, ew, ud]`.
    #[must_use]
    pub fn apply<T: Clone>(&self, raw: &[T; 3]) -> [T; 3] {
        [
            raw[self.ns].clone(),
            raw[self.ew].clone(),
            raw[self.ud].clone(),
        ]
    }
}

/// Split an axis-aligned interleaved sequence into X, Y and Z channels.
///
/// A trailing partial triplet is dropped.
#[must_use]
pub fn split_axes(samples: &[f64]) -> [Vec<f64>; 3] {
    let n = samples.len() / 3;
    let mut axes = [
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    ];
    for triplet in samples.chunks_exact(3) {
        for (axis, &v) in axes.iter_mut().zip(triplet) {
            axis.push(v);
        }
    }
    axes
}

/// Reconstruct per-triplet timestamps for one message.
///
/// The last triplet is stamped with `sent_millis`; earlier ones are spaced evenly back
/// to the previous message's send time, or by [`DEFAULT_SAMPLE_SPACING_MILLIS`] when
/// there is no previous message.
#[must_use]
pub fn sample_times(sent_millis: i64, previous_millis: Option<i64>, count: usize) -> Vec<i64> {
    if count == 0 {
        return Vec::new();
    }
    let dt = match previous_millis {
        Some(prev) => (sent_millis - prev) as f64 / count as f64,
        None => DEFAULT_SAMPLE_SPACING_MILLIS,
    };
    (0..count)
        .map(|i| (sent_millis as f64 - (count - 1 - i) as f64 * dt) as i64)
        .collect()
}

/// Accumulates interleaved samples until a full analysis window is available.
#[derive(Debug, Clone)]
pub struct AccelWindow {
    window_len: usize,
    orientation: Orientation,
    buffer: Vec<f64>,
}

impl AccelWindow {
    /// A window of `window_len` triplets.
    #[must_use]
    pub fn new(window_len: usize, orientation: Orientation) -> Self {
        Self {
            window_len,
            orientation,
            buffer: Vec::with_capacity(window_len * 3),
        }
    }

    /// Triplets held when full.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Number of samples (not triplets) still accepted.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.window_len * 3 - self.buffer.len()
    }

    /// Append up to [`remaining`](Self::remaining) samples and return how many were taken.
    pub fn push(&mut self, samples: &[f64]) -> usize {
        let taken = samples.len().min(self.remaining());
        self.buffer.extend_from_slice(&samples[..taken]);
        taken
    }

    /// Whether the window holds `window_len` complete triplets.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.window_len * 3
    }

    /// Drop all samples for the next window.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Interleaved samples pushed so far.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.buffer
    }

    /// Per-axis channels in `[ns, ew, ud]` order.
    ///
    /// Fails with `InsufficientWindow` until the window is full.
    pub fn channels(&self) -> AppResult<[Vec<f64>; 3]> {
        if !self.is_full() {
            return Err(DaqError::InsufficientWindow {
                len: self.buffer.len() / 3,
                required: self.window_len,
            });
        }
        Ok(self.orientation.apply(&split_axes(&self.buffer)))
    }

    /// Write one `ns ew ud` line per triplet.
    pub fn write_text<W: Write>(&self, mut w: W) -> AppResult<()> {
        let [ns, ew, ud] = self.orientation.apply(&split_axes(&self.buffer));
        for ((a, b), c) in ns.iter().zip(&ew).zip(&ud) {
            writeln!(w, "{a:.6} {b:.6} {c:.6}")?;
        }
        Ok(())
    }

    /// The raw interleaved buffer as a little-endian `f32` archive.
    #[must_use]
    pub fn to_f32_archive(&self) -> Vec<u8> {
        encode_f32_array(&self.buffer)
    }

    /// Spectrum of the full window in `[ns, ew, ud]` order.
    pub fn spectrum(&self, analyzer: &SpectralAnalyzer) -> AppResult<Vec<SpectrumBin>> {
        let [ns, ew, ud] = self.channels()?;
        analyzer.analyze(&ns, &ew, &ud)
    }

    /// Spectrum and cepstral envelope of the full window in `[ns, ew, ud]` order.
    pub fn smoothed_spectrum(
        &self,
        analyzer: &SpectralAnalyzer,
        cep_coeff: usize,
    ) -> AppResult<SmoothedSpectrum> {
        let [ns, ew, ud] = self.channels()?;
        analyzer.analyze_smoothed(&ns, &ew, &ud, cep_coeff)
    }

    /// Seismic intensity of the full window.
    pub fn intensity(&self, engine: &SeismicIntensityEngine) -> AppResult<IntensityValue> {
        let [ns, ew, ud] = self.channels()?;
        engine.evaluate(&ns, &ew, &ud)
    }
}
