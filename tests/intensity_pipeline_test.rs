//! Sensor messages through the recorder, the decoder and the analysis window.

use shm_daq::codec::archive::{decode_spectrum, encode_spectrum};
use shm_daq::codec::packet::decode_with_envelope;
use shm_daq::codec::sample::{RawTriple, GAL_PER_LSB};
use shm_daq::data::fft::{peak, SpectralAnalyzer};
use shm_daq::data::intensity::{jma_intensity, SeismicIntensityEngine};
use shm_daq::data::replay::read_all;
use shm_daq::data::storage::RecordStore;
use shm_daq::data::window::{AccelWindow, Orientation};
use std::f64::consts::PI;
use tempfile::tempdir;

const FS: f64 = 62.5;
const WINDOW: usize = 256;
const TONE_HZ: f64 = 5.0;
const AMPLITUDE_GAL: f64 = 40.0;

/// Acceleration messages carrying a tone on raw X and a weaker tone on raw Z.
fn tone_messages(triplets_per_message: usize) -> Vec<(i64, Vec<u8>)> {
    let mut messages = Vec::new();
    for (m, start) in (0..WINDOW).step_by(triplets_per_message).enumerate() {
        let sent = 1_700_000_000_000 + m as i64 * 512;
        let mut msg = sent.to_be_bytes().to_vec();
        msg.extend([0u8; 4]);
        msg.extend(((triplets_per_message * 3) as i32).to_be_bytes());
        for t in start..start + triplets_per_message {
            let phase = 2.0 * PI * TONE_HZ * t as f64 / FS;
            let x = AMPLITUDE_GAL * phase.sin();
            let z = 0.25 * AMPLITUDE_GAL * (3.0 * phase).cos();
            for (axis, gal) in [x, 0.0, z].into_iter().enumerate() {
                let raw = (gal / GAL_PER_LSB).round() as i32;
                msg.extend_from_slice(&RawTriple::encode(raw, axis == 0).0);
            }
        }
        messages.push((sent, msg));
    }
    messages
}

fn fill_window(orientation: Orientation) -> AccelWindow {
    let dir = tempdir().unwrap();
    let path = dir.path().join("acc.dat");
    let store = RecordStore::open(&path).unwrap();
    for (sent, msg) in tone_messages(32) {
        store.append(sent, "b8:27:eb:00:00:01/shm/acc02", &msg).unwrap();
    }
    store.close();

    let mut window = AccelWindow::new(WINDOW, orientation);
    for frame in read_all(&path).unwrap() {
        let timed = decode_with_envelope(&frame.payload).unwrap();
        assert_eq!(timed.sent_millis, frame.timestamp_millis);
        let aligned = timed.packet.aligned();
        assert_eq!(window.push(aligned), aligned.len());
    }
    assert!(window.is_full());
    window
}

#[test]
fn recorded_tone_peaks_within_one_bin() {
    let window = fill_window(Orientation::default());
    let analyzer = SpectralAnalyzer::new(WINDOW, FS).unwrap();
    let spectrum = window.spectrum(&analyzer).unwrap();
    assert_eq!(spectrum.len(), WINDOW);

    let bin_width = FS / WINDOW as f64;
    let x_peak = peak(&spectrum, 0).unwrap();
    assert!((x_peak.frequency_hz - TONE_HZ).abs() <= bin_width);
    let z_peak = peak(&spectrum, 2).unwrap();
    assert!((z_peak.frequency_hz - 3.0 * TONE_HZ).abs() <= bin_width);
    assert!(x_peak.amp_x > 10.0 * x_peak.amp_y);
}

#[test]
fn orientation_moves_the_tone() {
    let window = fill_window(Orientation { ns: 2, ew: 0, ud: 1 });
    let analyzer = SpectralAnalyzer::new(WINDOW, FS).unwrap();
    let spectrum = window.spectrum(&analyzer).unwrap();
    let ew_peak = peak(&spectrum, 1).unwrap();
    assert!((ew_peak.frequency_hz - TONE_HZ).abs() <= FS / WINDOW as f64);
    let ns_peak = peak(&spectrum, 0).unwrap();
    assert!((ns_peak.frequency_hz - 3.0 * TONE_HZ).abs() <= FS / WINDOW as f64);
}

#[test]
fn window_intensity_matches_direct_computation() {
    let window = fill_window(Orientation::default());
    let engine = SeismicIntensityEngine::new(WINDOW, FS).unwrap();
    let value = window.intensity(&engine).unwrap();

    let [ns, ew, ud] = window.channels().unwrap();
    let direct = jma_intensity(&ns, &ew, &ud, FS).unwrap();
    assert!((value.value - direct).abs() < 1e-12);
    assert!(value.value.is_finite() && value.value > 0.0);
    assert!(!value.class.is_empty());
}

#[test]
fn spectrum_archive_keeps_positive_half() {
    let window = fill_window(Orientation::default());
    let analyzer = SpectralAnalyzer::new(WINDOW, FS).unwrap();
    let spectrum = window.spectrum(&analyzer).unwrap();

    let archive = decode_spectrum(&encode_spectrum(&spectrum).unwrap()).unwrap();
    assert_eq!(archive.window_len, WINDOW);
    assert_eq!(archive.bins.len(), WINDOW / 2);
    assert!((f64::from(archive.df) - FS / WINDOW as f64).abs() < 1e-6);
    let strongest = archive
        .bins
        .iter()
        .enumerate()
        .max_by(|a, b| a.1[0].total_cmp(&b.1[0]))
        .map(|(i, _)| i)
        .unwrap();
    assert!((strongest as f64 * FS / WINDOW as f64 - TONE_HZ).abs() <= FS / WINDOW as f64);
}

#[test]
fn window_envelope_tracks_raw_spectrum() {
    let window = fill_window(Orientation::default());
    let analyzer = SpectralAnalyzer::new(WINDOW, FS).unwrap();
    let raw = window.spectrum(&analyzer).unwrap();

    // No quefrency falls strictly inside (N/2, N/2 + 1), so nothing is liftered.
    let unsmoothed = window.smoothed_spectrum(&analyzer, WINDOW / 2).unwrap();
    assert_eq!(unsmoothed.raw, raw);
    for (r, e) in raw.iter().zip(&unsmoothed.envelope).skip(1) {
        assert!((e.amp_x - r.amp_x).abs() <= 1e-6 * r.amp_x.max(1e-9));
    }

    let smoothed = window.smoothed_spectrum(&analyzer, 8).unwrap();
    assert_eq!(smoothed.envelope.len(), WINDOW);
    assert!(smoothed
        .envelope
        .iter()
        .all(|b| (0..3).all(|axis| b.amp(axis).is_finite() && b.amp(axis) > 0.0)));
}
