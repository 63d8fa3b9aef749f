//! Fixed-point sample codec for the triaxial accelerometer.
//!
//! Each reading travels as a 3-byte big-endian 20-bit two's-complement value whose low
//! nibble carries status bits. The lowest status bit is the phase marker: it is set on the
//! sample that starts an X/Y/Z triplet.
//!
//! Decoded samples are archived as fixed-width little-endian `f32` arrays.

use crate::error::{AppResult, DaqError};

/// Conversion factor from raw counts to gal (cm/s²): 256000 LSB per g.
pub const GAL_PER_LSB: f64 = 980.665 / 256000.0;

/// Size of one encoded reading on the wire.
pub const TRIPLE_LEN: usize = 3;

const POW19: i32 = 1 << 19;
const POW20: i32 = 1 << 20;
const MARKER_BIT: u8 = 0x01;

/// One raw 3-byte reading as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTriple(pub [u8; TRIPLE_LEN]);

impl RawTriple {
    /// Pack a raw 20-bit count, setting the phase marker when `marker` is true.
    ///
    /// Only the low 20 bits of `raw` are kept, so negative counts wrap into their
    /// two's-complement form.
    #[must_use]
    pub fn encode(raw: i32, marker: bool) -> Self {
        let v = (raw & (POW20 - 1)) as u32;
        let b0 = (v >> 12) as u8;
        let b1 = (v >> 4) as u8;
        let mut b2 = ((v & 0x0f) << 4) as u8;
        if marker {
            b2 |= MARKER_BIT;
        }
        Self([b0, b1, b2])
    }

    /// Signed 20-bit count carried by this reading.
    ///
    /// The sign fix uses a strict comparison: `0x80000` stays positive (`+2^19`), so the
    /// most negative count is `-(2^19 - 1)`.
    #[must_use]
    pub fn raw_value(&self) -> i32 {
        let [b0, b1, b2] = self.0;
        let mut v = (i32::from(b0) << 12) | (i32::from(b1) << 4) | (i32::from(b2) >> 4);
        if v > POW19 {
            v -= POW20;
        }
        v
    }

    /// Acceleration in gal.
    #[must_use]
    pub fn gal(&self) -> f64 {
        f64::from(self.raw_value()) * GAL_PER_LSB
    }

    /// Whether this reading starts an X/Y/Z triplet.
    #[must_use]
    pub fn has_marker(&self) -> bool {
        self.0[2] & MARKER_BIT != 0
    }
}

/// Decode one reading to gal.
#[must_use]
pub fn decode_triple(b0: u8, b1: u8, b2: u8) -> f64 {
    RawTriple([b0, b1, b2]).gal()
}

/// Decode a flat run of readings, ignoring any trailing partial reading.
#[must_use]
pub fn decode_triples(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(TRIPLE_LEN)
        .map(|c| decode_triple(c[0], c[1], c[2]))
        .collect()
}

/// Encode values as little-endian `f32`, 4 bytes each.
#[must_use]
pub fn encode_f32_array(values: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for &v in values {
        buf.extend_from_slice(&(v as f32).to_le_bytes());
    }
    buf
}

/// Decode a little-endian `f32` archive.
pub fn decode_f32_array(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(DaqError::TruncatedInput {
            len: bytes.len(),
            unit: 4,
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
