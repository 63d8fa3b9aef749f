//! Archive encodings for analysis results.
//!
//! Both formats are little-endian, matching the `f32` sample archive.

use crate::data::fft::SpectrumBin;
use crate::error::{AppResult, DaqError};

/// Header size of a spectrum archive: `i16` length plus `f32` bin width.
const SPECTRUM_HEADER_LEN: usize = 6;

/// A spectrum as stored on disk: one-sided bins at a fixed frequency step.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumArchive {
    /// Length of the transform the bins came from.
    pub window_len: usize,
    /// Bin spacing in Hz.
    pub df: f32,
    /// `[x, y, z]` amplitudes for bins `0..window_len / 2`.
    pub bins: Vec<[f32; 3]>,
}

/// Encode the lower half of a spectrum: `[i16 N][f32 df][N/2 x (f32 x, f32 y, f32 z)]`.
///
/// `df` is taken from bin 1 when present. Spectra longer than `i16::MAX` bins are rejected.
pub fn encode_spectrum(spectrum: &[SpectrumBin]) -> AppResult<Vec<u8>> {
    let n = i16::try_from(spectrum.len()).map_err(|_| {
        DaqError::Configuration(format!(
            "spectrum of {} bins does not fit the archive header",
            spectrum.len()
        ))
    })?;
    let df = spectrum.get(1).map_or(0.0, |b| b.frequency_hz) as f32;
    let half = spectrum.len() / 2;

    let mut buf = Vec::with_capacity(SPECTRUM_HEADER_LEN + half * 12);
    buf.extend_from_slice(&n.to_le_bytes());
    buf.extend_from_slice(&df.to_le_bytes());
    for bin in &spectrum[..half] {
        for amp in [bin.amp_x, bin.amp_y, bin.amp_z] {
            buf.extend_from_slice(&(amp as f32).to_le_bytes());
        }
    }
    Ok(buf)
}

/// Decode a spectrum archive written by [`encode_spectrum`].
pub fn decode_spectrum(bytes: &[u8]) -> AppResult<SpectrumArchive> {
    if bytes.len() < SPECTRUM_HEADER_LEN {
        return Err(DaqError::TruncatedInput {
            len: bytes.len(),
            unit: SPECTRUM_HEADER_LEN,
        });
    }
    let n = i16::from_le_bytes([bytes[0], bytes[1]]);
    let window_len = usize::try_from(n).map_err(|_| DaqError::SizeOverflow {
        offset: 0,
        declared: i32::from(n),
    })?;
    let df = f32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

    let body = &bytes[SPECTRUM_HEADER_LEN..];
    let half = window_len / 2;
    if body.len() != half * 12 {
        return Err(DaqError::TruncatedInput {
            len: body.len(),
            unit: 12,
        });
    }
    let bins = body
        .chunks_exact(12)
        .map(|c| {
            let f = |i: usize| f32::from_le_bytes([c[i], c[i + 1], c[i + 2], c[i + 3]]);
            [f(0), f(4), f(8)]
        })
        .collect();
    Ok(SpectrumArchive {
        window_len,
        df,
        bins,
    })
}

/// Encode an intensity value as a single little-endian `f32`.
#[must_use]
pub fn encode_intensity(value: f64) -> [u8; 4] {
    (value as f32).to_le_bytes()
}

/// Decode an intensity archive; exactly four bytes are required.
pub fn decode_intensity(bytes: &[u8]) -> AppResult<f32> {
    match bytes {
        [a, b, c, d] => Ok(f32::from_le_bytes([*a, *b, *c, *d])),
        _ => Err(DaqError::TruncatedInput {
            len: bytes.len(),
            unit: 4,
        }),
    }
}
