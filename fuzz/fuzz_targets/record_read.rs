//! Fuzz target for the record log reader.
//!
//! Tests:
//! - Arbitrary bytes parse without panicking
//! - Frames written by the store read back unchanged, with arbitrary trailing garbage

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shm_daq::data::replay::{read_all_from, RecordReader};
use shm_daq::data::storage::encode_frame;

#[derive(Debug, Arbitrary)]
struct RecordInput {
    frames: Vec<(i64, String, Vec<u8>)>,
    tail: Vec<u8>,
}

fuzz_target!(|input: RecordInput| {
    let _ = read_all_from(RecordReader::new(input.tail.as_slice()));

    let mut bytes = Vec::new();
    let mut written = Vec::new();
    for (ts, topic, payload) in input.frames.iter().take(64) {
        if topic.len() > 4096 {
            continue;
        }
        if let Ok(frame) = encode_frame(*ts, topic, payload) {
            bytes.extend(frame);
            written.push((*ts, topic.clone(), payload.clone()));
        }
    }

    let mut reader = RecordReader::new(bytes.as_slice());
    for (ts, topic, payload) in &written {
        let frame = match reader.next_frame() {
            Ok(Some(frame)) => frame,
            other => panic!("frame lost: {other:?}"),
        };
        assert_eq!(frame.timestamp_millis, *ts);
        assert_eq!(&frame.topic, topic);
        assert_eq!(&frame.payload, payload);
    }
    assert!(matches!(reader.next_frame(), Ok(None)));

    bytes.extend(&input.tail);
    let _ = read_all_from(RecordReader::new(bytes.as_slice()));
});
