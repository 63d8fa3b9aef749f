//! Byte-level codecs for sensor telemetry.
//!
//! - [`sample`]: the 3-byte fixed-point accelerometer reading and the `f32` archive form.
//! - [`phase`]: the pure axis-phase transition used to stitch sub-packets together.
//! - [`packet`]: the accelerometer message decoder.
//! - [`sensors`]: decoders for the simpler single-field sensors.
//! - [`archive`]: spectrum and intensity archive encodings.
pub mod archive;
pub mod packet;
pub mod phase;
pub mod sample;
pub mod sensors;
