//! # SHM DAQ Core Library
//!
//! This crate is the core library for the `shm-daq` recorder. It decodes telemetry from
//! wireless structural-health sensors, turns accelerometer windows into spectra and JMA
//! seismic intensity, and records raw bus traffic to rotating log files that can be read
//! back or replayed.
//!
//! ## Crate Structure
//!
//! - **`codec`**: Byte-level decoders. The accelerometer packet decoder with phase
//!   resynchronization, the smaller sensor payloads, and the `f32` archive layouts.
//! - **`config`**: Layered configuration (TOML file plus `SHM_DAQ_` environment
//!   variables). See `config::Settings`.
//! - **`core`**: Bus messages and topic parsing shared by every other module.
//! - **`data`**: Signal processing and storage: spectral analysis, the seismic intensity
//!   engine, the shindo scale, acceleration windows, the record store and record readback.
//! - **`error`**: The `DaqError` enum used across the library.
//! - **`logging`**: `tracing` subscriber setup.

pub mod codec;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod logging;

pub use crate::core::{BusMessage, SensorKind, Topic};
pub use crate::error::{AppResult, DaqError};
