//! Decoders for the single-field auxiliary sensors.
//!
//! Every message starts with the same 12-byte header: an 8-byte big-endian send time and
//! a 4-byte big-endian count whose meaning depends on the sensor.

use crate::error::{AppResult, DaqError};

/// Length of the shared sensor header.
pub const HEADER_LEN: usize = 12;

/// Number of values in a thermal-array frame: thermistor followed by 8x8 pixels.
pub const THERMAL_VALUES: usize = 65;

/// Header shared by all auxiliary sensor messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorHeader {
    /// Sender timestamp in Unix milliseconds.
    pub sent_millis: i64,
    /// Sensor-specific count field.
    pub count: i32,
}

/// Parse the shared 12-byte header.
pub fn read_header(b: &[u8]) -> AppResult<SensorHeader> {
    require(b, HEADER_LEN)?;
    Ok(SensorHeader {
        sent_millis: be_i64(b, 0),
        count: be_i32(b, 8),
    })
}

/// Strain gauge samples with reconstructed timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StrainSeries {
    /// Per-sample time, Unix milliseconds.
    pub times: Vec<i64>,
    /// Gauge readings, one per entry of `times`.
    pub values: Vec<f64>,
}

/// Decode a strain-gauge (load cell amplifier) message.
///
/// Layout: header, 8-byte big-endian start time, then 32-bit words holding 24-bit signed
/// counts. With `gauge_factor` the counts are converted to microstrain; otherwise the raw
/// counts are returned.
pub fn decode_strain(b: &[u8], gauge_factor: Option<f64>) -> AppResult<StrainSeries> {
    const POW23: i32 = 1 << 23;
    const POW24: i32 = 1 << 24;
    let lsb = 1.0 / 128.0 / f64::from(POW24);

    let header = read_header(b)?;
    require(b, HEADER_LEN + 8)?;
    let start = be_i64(b, HEADER_LEN);
    let data_bytes = usize::try_from(header.count.saturating_sub(8)).map_err(|_| DaqError::TruncatedInput {
        len: 0,
        unit: 4,
    })?;
    if data_bytes % 4 != 0 {
        return Err(DaqError::TruncatedInput {
            len: data_bytes,
            unit: 4,
        });
    }
    let count = data_bytes / 4;
    let first = HEADER_LEN + 8;
    if b.len() < first + data_bytes {
        return Err(DaqError::TruncatedPacket {
            offset: first,
            needed: data_bytes,
            available: b.len() - first,
        });
    }

    let dt = if count > 0 {
        header.sent_millis.saturating_sub(start) as f64 / count as f64
    } else {
        0.0
    };
    let mut series = StrainSeries {
        times: Vec::with_capacity(count),
        values: Vec::with_capacity(count),
    };
    for i in 0..count {
        let mut v = be_i32(b, first + 4 * i) & 0x00ff_ffff;
        if v > POW23 {
            v -= POW24;
        }
        series.times.push(start.saturating_add((dt * i as f64) as i64));
        series.values.push(match gauge_factor {
            Some(factor) => f64::from(v) * lsb * 4.0 / factor * 1e6,
            None => f64::from(v),
        });
    }
    Ok(series)
}

/// Decode an illuminance message: `count` big-endian `i16` readings.
pub fn decode_illuminance(b: &[u8]) -> AppResult<(i64, Vec<i16>)> {
    let header = read_header(b)?;
    let n = non_negative(header.count)?;
    require(b, HEADER_LEN + 2 * n)?;
    let values = (0..n)
        .map(|i| i16::from_be_bytes([b[HEADER_LEN + 2 * i], b[HEADER_LEN + 2 * i + 1]]))
        .collect();
    Ok((header.sent_millis, values))
}

/// Decode an infrared presence message: exactly one signed byte after the header.
pub fn decode_infrared(b: &[u8]) -> AppResult<(i64, i8)> {
    if b.len() != HEADER_LEN + 1 {
        return Err(DaqError::TruncatedInput {
            len: b.len(),
            unit: HEADER_LEN + 1,
        });
    }
    let header = read_header(b)?;
    Ok((header.sent_millis, i8::from_be_bytes([b[HEADER_LEN]])))
}

/// Decode a clock message; the count field carries the value.
pub fn decode_clock(b: &[u8]) -> AppResult<(i64, i32)> {
    let header = read_header(b)?;
    Ok((header.sent_millis, header.count))
}

/// Ultrasonic anemometer reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindReading {
    /// Send time from the message header.
    pub sent_millis: i64,
    /// Direction in degrees.
    pub angle: f64,
    /// Speed in m/s.
    pub speed: f64,
}

/// Decode a wind message: big-endian `f64` angle and speed after the header.
pub fn decode_wind(b: &[u8]) -> AppResult<WindReading> {
    let header = read_header(b)?;
    require(b, HEADER_LEN + 16)?;
    Ok(WindReading {
        sent_millis: header.sent_millis,
        angle: f64::from_bits(be_i64(b, HEADER_LEN) as u64),
        speed: f64::from_bits(be_i64(b, HEADER_LEN + 8) as u64),
    })
}

/// Temperature and humidity series.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateSeries {
    /// Send time from the message header.
    pub sent_millis: i64,
    /// Degrees Celsius.
    pub temperature: Vec<f64>,
    /// Relative humidity in percent.
    pub humidity: Vec<f64>,
}

/// Decode a temperature/humidity message: `count` big-endian `f32`, alternating
/// temperature then humidity.
pub fn decode_climate(b: &[u8]) -> AppResult<ClimateSeries> {
    let header = read_header(b)?;
    let n = non_negative(header.count)?;
    require(b, HEADER_LEN + 4 * n)?;
    let mut series = ClimateSeries {
        sent_millis: header.sent_millis,
        temperature: Vec::with_capacity(n / 2),
        humidity: Vec::with_capacity(n / 2),
    };
    for i in 0..n {
        let v = f64::from(f32::from_bits(be_i32(b, HEADER_LEN + 4 * i) as u32));
        if i % 2 == 0 {
            series.temperature.push(v);
        } else {
            series.humidity.push(v);
        }
    }
    Ok(series)
}

/// Decode a raw 8x8 thermal-array frame (no header) into degrees Celsius.
///
/// Index 0 is the thermistor (0.0625 °C/LSB); indices 1..=64 are pixels (0.25 °C/LSB)
/// in row-major order with bit 11 as the sign.
pub fn decode_thermal(b: &[u8]) -> AppResult<Vec<f64>> {
    require(b, 2 * THERMAL_VALUES)?;
    let word = |lo: u8, hi: u8| (u16::from(hi & 0x07) << 8) | u16::from(lo);
    let mut out = Vec::with_capacity(THERMAL_VALUES);
    out.push(f64::from(word(b[0], b[1])) * 0.0625);
    for px in 0..THERMAL_VALUES - 1 {
        let i = 2 * px + 2;
        let t = f64::from(word(b[i], b[i + 1])) * 0.25;
        out.push(if b[i + 1] & 0x08 != 0 { -t } else { t });
    }
    Ok(out)
}

fn require(b: &[u8], len: usize) -> AppResult<()> {
    if b.len() < len {
        return Err(DaqError::EnvelopeTooShort {
            len: b.len(),
            required: len,
        });
    }
    Ok(())
}

fn non_negative(count: i32) -> AppResult<usize> {
    usize::try_from(count).map_err(|_| DaqError::SizeOverflow {
        offset: 8,
        declared: count,
    })
}

fn be_i64(b: &[u8], at: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[at..at + 8]);
    i64::from_be_bytes(buf)
}

fn be_i32(b: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(sent: i64, count: i32) -> Vec<u8> {
        let mut b = sent.to_be_bytes().to_vec();
        b.extend(count.to_be_bytes());
        b
    }

    #[test]
    fn strain_timestamps_and_sign() {
        let mut b = header(1_000, 8 + 4 * 4);
        b.extend(960i64.to_be_bytes());
        for raw in [1i32, -1, 0x00ff_ffff, 0x0080_0001] {
            b.extend(raw.to_be_bytes());
        }
        let s = decode_strain(&b, None).unwrap();
        assert_eq!(s.times, vec![960, 970, 980, 990]);
        assert_eq!(s.values, vec![1.0, -1.0, -1.0, -8_388_607.0]);
    }

    #[test]
    fn strain_rejects_misaligned_size() {
        let mut b = header(0, 8 + 3);
        b.extend([0u8; 11]);
        assert!(matches!(
            decode_strain(&b, None),
            Err(DaqError::TruncatedInput { len: 3, unit: 4 })
        ));
    }

    #[test]
    fn strain_microstrain_conversion() {
        let mut b = header(10, 12);
        b.extend(0i64.to_be_bytes());
        b.extend(128i32.to_be_bytes());
        let s = decode_strain(&b, Some(2.0)).unwrap();
        let expected = 128.0 / 128.0 / f64::from(1 << 24) * 4.0 / 2.0 * 1e6;
        assert!((s.values[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn illuminance_values() {
        let mut b = header(5, 2);
        b.extend(300i16.to_be_bytes());
        b.extend((-2i16).to_be_bytes());
        assert_eq!(decode_illuminance(&b).unwrap(), (5, vec![300, -2]));
    }

    #[test]
    fn illuminance_truncated() {
        let mut b = header(5, 3);
        b.extend([0u8; 4]);
        assert!(decode_illuminance(&b).is_err());
    }

    #[test]
    fn infrared_requires_exact_length() {
        let mut b = header(7, 0);
        b.push(0xff);
        assert_eq!(decode_infrared(&b).unwrap(), (7, -1));
        b.push(0);
        assert!(decode_infrared(&b).is_err());
    }

    #[test]
    fn clock_value_in_count() {
        assert_eq!(decode_clock(&header(9, 42)).unwrap(), (9, 42));
    }

    #[test]
    fn wind_reading() {
        let mut b = header(3, 16);
        b.extend(270.5f64.to_be_bytes());
        b.extend(4.25f64.to_be_bytes());
        let w = decode_wind(&b).unwrap();
        assert_eq!(w.angle, 270.5);
        assert_eq!(w.speed, 4.25);
        assert!(decode_wind(&b[..20]).is_err());
    }

    #[test]
    fn climate_alternates() {
        let mut b = header(1, 4);
        for v in [21.5f32, 40.0, 22.0, 41.5] {
            b.extend(v.to_be_bytes());
        }
        let c = decode_climate(&b).unwrap();
        assert_eq!(c.temperature, vec![21.5, 22.0]);
        assert_eq!(c.humidity, vec![40.0, 41.5]);
    }

    #[test]
    fn thermal_frame() {
        let mut b = vec![0u8; 2 * THERMAL_VALUES];
        b[0] = 0x90; // 144 * 0.0625 = 9.0
        b[1] = 0x01; // + 256 * 0.0625 = 16.0
        b[2] = 100; // pixel 0: 25.0
        b[4] = 8; // pixel 1: -2.0
        b[5] = 0x08;
        let t = decode_thermal(&b).unwrap();
        assert_eq!(t.len(), THERMAL_VALUES);
        assert_eq!(t[0], 25.0);
        assert_eq!(t[1], 25.0);
        assert_eq!(t[2], -2.0);
        assert!(decode_thermal(&b[..100]).is_err());
    }
}
