use proptest::prelude::*;
use shm_daq::codec::packet::{decode_packet, decode_with_envelope};
use shm_daq::codec::sample::{decode_triple, RawTriple, GAL_PER_LSB};
use shm_daq::error::DaqError;

/// A synthetic sensor stream: sample `j` carries raw count `j + 1` and belongs to axis
/// `(start + j) % 3`, with the marker set on every X sample.
struct Stream {
    start: usize,
}

impl Stream {
    fn axis(&self, j: usize) -> usize {
        (self.start + j) % 3
    }

    fn subpacket(&self, from: usize, count: usize) -> Vec<u8> {
        let mut out = (count as i32).to_be_bytes().to_vec();
        for j in from..from + count {
            out.extend_from_slice(&RawTriple::encode(j as i32 + 1, self.axis(j) == 0).0);
        }
        out
    }
}

fn raw_counts(samples: &[f64]) -> Vec<i32> {
    samples
        .iter()
        .map(|s| (s / GAL_PER_LSB).round() as i32)
        .collect()
}

proptest! {
    #[test]
    fn overlapping_subpackets_stay_axis_aligned(
        start in 0usize..3,
        layout in prop::collection::vec((3usize..40, 0usize..=2), 1..8),
    ) {
        let stream = Stream { start };
        let mut body = Vec::new();
        let mut pos = 0usize;
        for (i, &(count, overlap)) in layout.iter().enumerate() {
            if i > 0 {
                pos -= overlap;
            }
            body.extend(stream.subpacket(pos, count));
            pos += count;
        }

        let packet = decode_packet(&body).unwrap();
        let expected: Vec<i32> = (1..=pos as i32).collect();
        prop_assert_eq!(raw_counts(&packet.samples), expected);

        for (t, triplet) in packet.triplets().enumerate() {
            for (axis, value) in triplet.iter().enumerate() {
                let j = (value / GAL_PER_LSB).round() as usize - 1;
                prop_assert_eq!(stream.axis(j), axis, "triplet {} axis {}", t, axis);
            }
        }
    }

    #[test]
    fn arbitrary_bytes_never_panic(body in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(packet) = decode_packet(&body) {
            prop_assert!(packet.axis_offset < 3);
        }
    }
}

#[test]
fn zero_bytes_decode_to_zero() {
    assert_eq!(decode_triple(0x00, 0x00, 0x00), 0.0);
}

#[test]
fn sign_fix_boundary_is_strict() {
    // 0x80000 is exactly 2^19 and stays positive.
    assert_eq!(decode_triple(0x80, 0x00, 0x00), f64::from(1 << 19) * GAL_PER_LSB);
    // 0x80001 is the most negative decodable count.
    assert_eq!(
        decode_triple(0x80, 0x00, 0x10),
        -f64::from((1 << 19) - 1) * GAL_PER_LSB
    );
    assert_eq!(decode_triple(0xff, 0xff, 0xf0), -GAL_PER_LSB);
}

#[test]
fn marker_one_late_drops_one_sample() {
    let stream = Stream { start: 0 };
    // First covers samples 0..5 (X Y Z X Y); the next X is expected at index 1 of the
    // following sub-packet but the second starts one sample early, at the Y.
    let mut body = stream.subpacket(0, 5);
    body.extend(stream.subpacket(4, 6));
    let packet = decode_packet(&body).unwrap();
    assert_eq!(raw_counts(&packet.samples), (1..=10).collect::<Vec<_>>());
    assert_eq!(packet.axis_offset, 0);
    assert_eq!(raw_counts(packet.aligned()), (1..=9).collect::<Vec<_>>());
}

#[test]
fn oversized_count_is_rejected() {
    let mut body = 40000i32.to_be_bytes().to_vec();
    body.extend(vec![0u8; 64]);
    assert!(matches!(
        decode_packet(&body).unwrap_err().error,
        DaqError::SizeOverflow { declared: 40000, .. }
    ));
}

#[test]
fn count_beyond_payload_is_truncated() {
    let mut body = 10i32.to_be_bytes().to_vec();
    body.extend(vec![0u8; 9]);
    let failure = decode_packet(&body).unwrap_err();
    assert!(matches!(
        failure.error,
        DaqError::TruncatedPacket { offset: 4, needed: 30, available: 9 }
    ));
}

#[test]
fn bad_message_does_not_affect_the_next() {
    let stream = Stream { start: 1 };
    let mut good = 1_700_000_000_000i64.to_be_bytes().to_vec();
    good.extend([0u8; 4]);
    good.extend(stream.subpacket(0, 6));

    let mut bad = good.clone();
    bad.truncate(bad.len() - 2);

    assert!(decode_with_envelope(&bad).is_err());
    let timed = decode_with_envelope(&good).unwrap();
    assert_eq!(timed.sent_millis, 1_700_000_000_000);
    assert_eq!(timed.packet.axis_offset, 2);
    assert_eq!(timed.packet.triplet_count(), 1);
}
