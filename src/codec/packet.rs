//! Accelerometer message decoder.
//!
//! A message body is a back-to-back run of sub-packets, each a 4-byte big-endian signed
//! sample count followed by that many 3-byte readings. The decoder stitches the
//! sub-packets into one interleaved X/Y/Z stream, using the embedded phase markers to
//! drop samples that overlap between sub-packets.
//!
//! # Guarantee
//!
//! For a successful decode, `samples[axis_offset..]` truncated to a multiple of three is
//! exactly `X, Y, Z, X, Y, Z, ...`. The decoder holds no state between calls.
//!
//! # Example
//!
//! ```
//! use shm_daq::codec::packet::decode_packet;
//! use shm_daq::codec::sample::RawTriple;
//!
//! let mut body = 3i32.to_be_bytes().to_vec();
//! for (i, raw) in [100, 200, 300].into_iter().enumerate() {
//!     body.extend_from_slice(&RawTriple::encode(raw, i == 0).0);
//! }
//! let packet = decode_packet(&body).unwrap();
//! assert_eq!(packet.samples.len(), 3);
//! assert_eq!(packet.axis_offset, 0);
//! ```

use tracing::debug;

use super::phase::AxisPhase;
use super::sample::{RawTriple, TRIPLE_LEN};
use crate::error::DaqError;

/// Length of the sub-packet count header.
pub const COUNT_LEN: usize = 4;

/// Exclusive upper bound on the declared sample count of a sub-packet.
pub const MAX_SUBPACKET_SAMPLES: i32 = 32768;

/// Length of the message envelope: 8-byte send time plus 4 reserved bytes.
pub const ENVELOPE_LEN: usize = 12;

/// A successfully decoded accelerometer message body.
#[derive(Debug, Clone, PartialEq)]
pub struct AccelPacket {
    /// Interleaved samples in gal.
    pub samples: Vec<f64>,
    /// Index of the first X sample in `samples`.
    pub axis_offset: usize,
}

impl AccelPacket {
    /// Number of complete X/Y/Z triplets after `axis_offset`.
    #[must_use]
    pub fn triplet_count(&self) -> usize {
        self.samples.len().saturating_sub(self.axis_offset) / 3
    }

    /// Iterate complete `[x, y, z]` triplets in arrival order.
    pub fn triplets(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.samples
            .get(self.axis_offset..)
            .unwrap_or_default()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
    }

    /// The axis-aligned part of the stream, truncated to whole triplets.
    #[must_use]
    pub fn aligned(&self) -> &[f64] {
        let end = self.axis_offset + self.triplet_count() * 3;
        &self.samples[self.axis_offset.min(end)..end]
    }
}

/// A failed decode: the error plus whatever was decoded before it.
///
/// The prefix is kept for diagnostics only; callers must discard it.
#[derive(Debug)]
pub struct DecodeFailure {
    /// Samples decoded before the failure.
    pub partial: AccelPacket,
    /// What went wrong.
    pub error: DaqError,
}

impl From<DecodeFailure> for DaqError {
    fn from(value: DecodeFailure) -> Self {
        value.error
    }
}

/// A decoded message together with its envelope send time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedAccelPacket {
    /// Sender timestamp in Unix milliseconds.
    pub sent_millis: i64,
    /// Decoded body.
    pub packet: AccelPacket,
}

/// Decode one accelerometer message body.
pub fn decode_packet(body: &[u8]) -> Result<AccelPacket, DecodeFailure> {
    let mut out = AccelPacket {
        samples: Vec::with_capacity(body.len() / TRIPLE_LEN),
        axis_offset: 0,
    };
    let mut phase: Option<AxisPhase> = None;
    let mut pos = 0;

    while pos < body.len() {
        let count = match read_count(body, pos) {
            Ok(count) => count,
            Err(error) => return Err(DecodeFailure { partial: out, error }),
        };
        pos += COUNT_LEN;

        let needed = count * TRIPLE_LEN;
        let available = body.len() - pos;
        if available < needed {
            return Err(DecodeFailure {
                partial: out,
                error: DaqError::TruncatedPacket {
                    offset: pos,
                    needed,
                    available,
                },
            });
        }

        let triples: Vec<RawTriple> = body[pos..pos + needed]
            .chunks_exact(TRIPLE_LEN)
            .map(|c| RawTriple([c[0], c[1], c[2]]))
            .collect();
        let marker = triples
            .iter()
            .take(3)
            .position(RawTriple::has_marker)
            .unwrap_or(0);

        match phase {
            None => {
                out.samples.extend(triples.iter().map(RawTriple::gal));
                out.axis_offset = marker;
                phase = Some(AxisPhase::after_first(marker, count));
            }
            Some(expected) => {
                let step = expected.resync(marker, count);
                if step.drop > 0 {
                    debug!(offset = pos, drop = step.drop, "dropping overlapping samples");
                }
                out.samples
                    .extend(triples[step.drop..].iter().map(RawTriple::gal));
                phase = Some(step.phase);
            }
        }
        pos += needed;
    }

    Ok(out)
}

/// Strip the 12-byte envelope and decode the body.
///
/// Returns the sender timestamp alongside the decoded packet. A message of 12 bytes or
/// fewer fails with `EnvelopeTooShort`.
pub fn decode_with_envelope(message: &[u8]) -> Result<TimedAccelPacket, DecodeFailure> {
    let sent_millis = match read_envelope(message) {
        Ok(sent) => sent,
        Err(error) => {
            return Err(DecodeFailure {
                partial: AccelPacket {
                    samples: Vec::new(),
                    axis_offset: 0,
                },
                error,
            })
        }
    };
    let packet = decode_packet(&message[ENVELOPE_LEN..])?;
    Ok(TimedAccelPacket {
        sent_millis,
        packet,
    })
}

/// Read the big-endian send time from a message envelope.
pub fn read_envelope(message: &[u8]) -> Result<i64, DaqError> {
    if message.len() <= ENVELOPE_LEN {
        return Err(DaqError::EnvelopeTooShort {
            len: message.len(),
            required: ENVELOPE_LEN + 1,
        });
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&message[..8]);
    Ok(i64::from_be_bytes(ts))
}

fn read_count(body: &[u8], pos: usize) -> Result<usize, DaqError> {
    let available = body.len() - pos;
    if available < COUNT_LEN {
        return Err(DaqError::TruncatedPacket {
            offset: pos,
            needed: COUNT_LEN,
            available,
        });
    }
    let declared = i32::from_be_bytes([body[pos], body[pos + 1], body[pos + 2], body[pos + 3]]);
    if !(0..MAX_SUBPACKET_SAMPLES).contains(&declared) {
        return Err(DaqError::SizeOverflow {
            offset: pos,
            declared,
        });
    }
    Ok(declared as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::sample::GAL_PER_LSB;

    /// Build a sub-packet from raw counts; `marker` flags the given index.
    fn subpacket(raws: &[i32], marker: Option<usize>) -> Vec<u8> {
        let mut out = (raws.len() as i32).to_be_bytes().to_vec();
        for (i, &raw) in raws.iter().enumerate() {
            out.extend_from_slice(&RawTriple::encode(raw, Some(i) == marker).0);
        }
        out
    }

    fn raw_counts(samples: &[f64]) -> Vec<i32> {
        samples
            .iter()
            .map(|s| (s / GAL_PER_LSB).round() as i32)
            .collect()
    }

    #[test]
    fn single_subpacket_with_offset() {
        // Z X Y Z X Y
        let body = subpacket(&[3, 1, 2, 3, 1, 2], Some(1));
        let p = decode_packet(&body).unwrap();
        assert_eq!(p.axis_offset, 1);
        assert_eq!(raw_counts(p.aligned()), vec![1, 2, 3]);
        assert_eq!(p.triplet_count(), 1);
    }

    #[test]
    fn missing_marker_defaults_to_zero() {
        let body = subpacket(&[1, 2, 3], None);
        assert_eq!(decode_packet(&body).unwrap().axis_offset, 0);
    }

    #[test]
    fn lowest_marker_wins() {
        let mut body = 3i32.to_be_bytes().to_vec();
        body.extend_from_slice(&RawTriple::encode(7, false).0);
        body.extend_from_slice(&RawTriple::encode(8, true).0);
        body.extend_from_slice(&RawTriple::encode(9, true).0);
        assert_eq!(decode_packet(&body).unwrap().axis_offset, 1);
    }

    #[test]
    fn overlap_sample_is_dropped() {
        // First: X Y Z X Y -> next X expected one sample into the next packet (Z first).
        let mut body = subpacket(&[1, 2, 3, 1, 2], Some(0));
        // Second repeats the Y, so its X marker sits one position later than expected.
        body.extend(subpacket(&[2, 3, 1, 2, 3], Some(2)));
        let p = decode_packet(&body).unwrap();
        assert_eq!(p.samples.len(), 9);
        assert_eq!(p.axis_offset, 0);
        assert_eq!(raw_counts(&p.samples), vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn contiguous_subpackets_keep_everything() {
        let mut body = subpacket(&[1, 2, 3, 1], Some(0));
        body.extend(subpacket(&[2, 3, 1, 2, 3], Some(2)));
        let p = decode_packet(&body).unwrap();
        assert_eq!(raw_counts(&p.samples), vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn size_overflow_reported() {
        let mut body = 40000i32.to_be_bytes().to_vec();
        body.extend(vec![0u8; 30]);
        let failure = decode_packet(&body).unwrap_err();
        assert!(matches!(
            failure.error,
            DaqError::SizeOverflow {
                offset: 0,
                declared: 40000
            }
        ));
    }

    #[test]
    fn negative_count_is_overflow() {
        let body = (-1i32).to_be_bytes().to_vec();
        assert!(matches!(
            decode_packet(&body).unwrap_err().error,
            DaqError::SizeOverflow { declared: -1, .. }
        ));
    }

    #[test]
    fn truncated_packet_keeps_prefix() {
        let mut body = subpacket(&[1, 2, 3], Some(0));
        let mut short = 5i32.to_be_bytes().to_vec();
        short.extend(vec![0u8; 6]);
        body.extend(short);
        let failure = decode_packet(&body).unwrap_err();
        assert_eq!(failure.partial.samples.len(), 3);
        assert!(matches!(
            failure.error,
            DaqError::TruncatedPacket {
                offset: 17,
                needed: 15,
                available: 6
            }
        ));
    }

    #[test]
    fn trailing_partial_header_is_truncated() {
        let mut body = subpacket(&[1, 2, 3], Some(0));
        body.extend([0u8, 0]);
        assert!(matches!(
            decode_packet(&body).unwrap_err().error,
            DaqError::TruncatedPacket { needed: 4, available: 2, .. }
        ));
    }

    #[test]
    fn empty_body_decodes_to_nothing() {
        let p = decode_packet(&[]).unwrap();
        assert!(p.samples.is_empty());
        assert_eq!(p.triplet_count(), 0);
    }

    #[test]
    fn envelope_is_stripped() {
        let mut msg = 1_600_000_000_123i64.to_be_bytes().to_vec();
        msg.extend([0u8; 4]);
        msg.extend(subpacket(&[1, 2, 3], Some(0)));
        let timed = decode_with_envelope(&msg).unwrap();
        assert_eq!(timed.sent_millis, 1_600_000_000_123);
        assert_eq!(timed.packet.samples.len(), 3);
    }

    #[test]
    fn short_envelope_rejected() {
        let failure = decode_with_envelope(&[0u8; 12]).unwrap_err();
        assert!(matches!(
            failure.error,
            DaqError::EnvelopeTooShort { len: 12, required: 13 }
        ));
    }
}
