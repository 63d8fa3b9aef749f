//! Fuzz target for the accelerometer packet decoder.
//!
//! Tests:
//! - Arbitrary message bodies never panic
//! - Successful decodes report an axis offset inside the first triplet
//! - Envelope stripping agrees with the bare decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use shm_daq::codec::packet::{decode_packet, decode_with_envelope, ENVELOPE_LEN};

fuzz_target!(|data: &[u8]| {
    let bare = decode_packet(data);
    if let Ok(packet) = &bare {
        assert!(packet.axis_offset < 3);
        assert_eq!(packet.aligned().len() % 3, 0);
    }

    if data.len() > ENVELOPE_LEN {
        let timed = decode_with_envelope(data);
        let body = decode_packet(&data[ENVELOPE_LEN..]);
        assert_eq!(timed.is_ok(), body.is_ok());
        if let (Ok(timed), Ok(body)) = (timed, body) {
            assert_eq!(timed.packet, body);
        }
    }
});
