//! Record log readback and paced replay.
//!
//! [`RecordReader`] parses the frame format written by
//! [`RecordStore`](super::storage::RecordStore) from any `Read` source. A file that ends
//! part-way through a timestamp, topic or length field is treated as a clean end of
//! stream (the writer was interrupted). A payload shorter than its declared length, or a
//! topic that is not UTF-8, is a [`DaqError::CorruptFrame`].

use crate::core::BusMessage;
use crate::error::{AppResult, DaqError};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use super::storage::MAX_PAYLOAD_LEN;

/// Longest topic accepted before the frame is considered corrupt.
pub const MAX_TOPIC_LEN: usize = 4096;

/// One recorded bus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFrame {
    /// Arrival time recorded by the writer, Unix milliseconds.
    pub timestamp_millis: i64,
    /// Bus topic, `<device>/<group>/<sensor>`.
    pub topic: String,
    /// Message bytes exactly as received.
    pub payload: Vec<u8>,
}

impl RecordFrame {
    /// The frame as a bus message arriving at the recorded time.
    #[must_use]
    pub fn into_message(self) -> BusMessage {
        BusMessage::new(self.topic, self.payload, self.timestamp_millis)
    }
}

/// Reads frames from a byte stream.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production code a
/// `BufReader<File>`.
pub struct RecordReader<R: Read> {
    reader: R,
    frames_read: u64,
    bytes_read: u64,
}

impl RecordReader<BufReader<File>> {
    /// Open a record file for sequential reading.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap a byte source positioned at a frame boundary.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frames_read: 0,
            bytes_read: 0,
        }
    }

    /// Read the next frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> AppResult<Option<RecordFrame>> {
        let start = self.bytes_read;

        let mut ts = [0u8; 8];
        let n = self.fill(&mut ts)?;
        if n < ts.len() {
            if n > 0 {
                warn!(offset = start, "record ends inside a timestamp");
            }
            return Ok(None);
        }

        let mut topic = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            if self.fill(&mut byte)? == 0 {
                warn!(offset = start, "record ends inside a topic");
                return Ok(None);
            }
            if byte[0] == 0 {
                break;
            }
            if topic.len() == MAX_TOPIC_LEN {
                return Err(DaqError::CorruptFrame {
                    offset: start,
                    field: "topic",
                    declared: MAX_TOPIC_LEN + 1,
                    available: MAX_TOPIC_LEN,
                });
            }
            topic.push(byte[0]);
        }
        let declared_topic = topic.len();
        let topic = String::from_utf8(topic).map_err(|e| DaqError::CorruptFrame {
            offset: start,
            field: "topic",
            declared: declared_topic,
            available: e.utf8_error().valid_up_to(),
        })?;

        let mut len = [0u8; 4];
        if self.fill(&mut len)? < len.len() {
            warn!(offset = start, "record ends inside a length field");
            return Ok(None);
        }
        let declared = u32::from_be_bytes(len) as usize;
        if declared > MAX_PAYLOAD_LEN {
            return Err(DaqError::CorruptFrame {
                offset: start,
                field: "payload",
                declared,
                available: 0,
            });
        }

        let mut payload = Vec::with_capacity(declared.min(1 << 16));
        let got = (&mut self.reader)
            .take(declared as u64)
            .read_to_end(&mut payload)?;
        self.bytes_read += got as u64;
        if got < declared {
            return Err(DaqError::CorruptFrame {
                offset: start,
                field: "payload",
                declared,
                available: got,
            });
        }

        self.frames_read += 1;
        Ok(Some(RecordFrame {
            timestamp_millis: i64::from_be_bytes(ts),
            topic,
            payload,
        }))
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Number of bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Convert into a frame iterator.
    pub fn frames(self) -> FrameIter<R> {
        FrameIter {
            inner: self,
            done: false,
        }
    }

    /// Read every remaining frame, stopping at the first error.
    ///
    /// Frames preceding the error are returned alongside it.
    pub fn read_until_error(&mut self) -> (Vec<RecordFrame>, Option<DaqError>) {
        let mut frames = Vec::new();
        loop {
            match self.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => return (frames, None),
                Err(e) => return (frames, Some(e)),
            }
        }
    }

    /// Read until `buf` is full or the stream ends; returns the bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> AppResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.bytes_read += filled as u64;
        Ok(filled)
    }
}

/// Iterator adapter over record frames.
///
/// Yields at most one error, after which it is exhausted.
pub struct FrameIter<R: Read> {
    inner: RecordReader<R>,
    done: bool,
}

impl<R: Read> FrameIter<R> {
    /// Frames yielded so far, not counting a trailing error.
    pub fn frames_read(&self) -> u64 {
        self.inner.frames_read
    }
}

impl<R: Read> Iterator for FrameIter<R> {
    type Item = AppResult<RecordFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read a whole record file.
pub fn read_all(path: impl AsRef<Path>) -> AppResult<Vec<RecordFrame>> {
    read_all_from(RecordReader::open(path)?)
}

/// Read every frame from an open reader.
pub fn read_all_from<R: Read>(mut reader: RecordReader<R>) -> AppResult<Vec<RecordFrame>> {
    match reader.read_until_error() {
        (frames, None) => Ok(frames),
        (_, Some(e)) => Err(e),
    }
}

/// Lazily stream a record file. Reopen the file to restart.
pub fn read_stream(path: impl AsRef<Path>) -> AppResult<FrameIter<BufReader<File>>> {
    Ok(RecordReader::open(path)?.frames())
}

/// Replay frames, sleeping between them to reproduce the recorded spacing.
///
/// Gaps are divided by `speed`; backwards timestamps are not waited on. The callback
/// sees every frame in order. Returns the number of frames replayed, or the first
/// read error.
pub async fn replay_paced<I, F>(frames: I, speed: f64, mut on_frame: F) -> AppResult<u64>
where
    I: IntoIterator<Item = AppResult<RecordFrame>>,
    F: FnMut(&RecordFrame),
{
    if !(speed > 0.0 && speed.is_finite()) {
        return Err(DaqError::Configuration(format!(
            "replay speed must be positive, got {speed}"
        )));
    }
    let mut previous: Option<i64> = None;
    let mut count = 0;
    for frame in frames {
        let frame = frame?;
        if let Some(prev) = previous {
            let gap = frame.timestamp_millis.saturating_sub(prev);
            if gap > 0 {
                let wait = Duration::from_secs_f64(gap as f64 / 1000.0 / speed);
                debug!(gap_ms = gap, "replay waiting");
                tokio::time::sleep(wait).await;
            }
        }
        previous = Some(frame.timestamp_millis);
        on_frame(&frame);
        count += 1;
    }
    Ok(count)
}
