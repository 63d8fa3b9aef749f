//! JMA seismic intensity classes (shindo) and their display colors.
//!
//! The table is immutable: ten half-open bins `[lo, hi)` on the instrumental intensity
//! scale, each with a label and a reference RGB color at its midpoint. Colors between
//! midpoints are linearly interpolated; the two open-ended bins use their fixed color.

use serde::Serialize;

/// One intensity class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShindoClass {
    /// Class label, e.g. `"5-"`.
    pub name: &'static str,
    /// Inclusive lower bound.
    pub lo: f64,
    /// Exclusive upper bound.
    pub hi: f64,
    /// Reference color at [`mid`](Self::mid).
    pub rgb: [u8; 3],
}

impl ShindoClass {
    /// Reference point of the bin's color.
    ///
    /// For the open-ended bins this is half a unit beyond the finite bound. The bins are
    /// unbounded, so a literal midpoint would sit at roughly `±f64::MAX / 2`, and the half
    /// of the neighbouring bin that interpolates towards it would stay pinned at that
    /// neighbour's own color. Anchoring at `hi - 0.5` / `lo + 0.5` keeps the ramp into
    /// classes 0 and 7 continuous.
    ///
    /// ```
    /// use shm_daq::data::shindo::SHINDO;
    ///
    /// assert_eq!(SHINDO[0].mid(), 0.0);
    /// assert_eq!(SHINDO[9].mid(), 7.0);
    /// assert_eq!(SHINDO[4].mid(), 4.0);
    /// ```
    #[must_use]
    pub fn mid(&self) -> f64 {
        match (self.lo.is_finite(), self.hi.is_finite()) {
            (true, true) => 0.5 * (self.lo + self.hi),
            (false, _) => self.hi - 0.5,
            (_, false) => self.lo + 0.5,
        }
    }
}

/// The ten JMA intensity classes in ascending order.
pub static SHINDO: [ShindoClass; 10] = [
    ShindoClass { name: "0", lo: f64::NEG_INFINITY, hi: 0.5, rgb: [255, 255, 255] },
    ShindoClass { name: "1", lo: 0.5, hi: 1.5, rgb: [242, 242, 255] },
    ShindoClass { name: "2", lo: 1.5, hi: 2.5, rgb: [0, 170, 255] },
    ShindoClass { name: "3", lo: 2.5, hi: 3.5, rgb: [0, 65, 255] },
    ShindoClass { name: "4", lo: 3.5, hi: 4.5, rgb: [255, 230, 150] },
    ShindoClass { name: "5-", lo: 4.5, hi: 5.0, rgb: [255, 230, 0] },
    ShindoClass { name: "5+", lo: 5.0, hi: 5.5, rgb: [255, 153, 0] },
    ShindoClass { name: "6-", lo: 5.5, hi: 6.0, rgb: [255, 40, 0] },
    ShindoClass { name: "6+", lo: 6.0, hi: 6.5, rgb: [165, 0, 33] },
    ShindoClass { name: "7", lo: 6.5, hi: f64::INFINITY, rgb: [180, 0, 104] },
];

/// Index of the class containing `value`: the first bin whose upper bound exceeds it.
///
/// NaN falls through to the top class.
#[must_use]
pub fn class_index(value: f64) -> usize {
    SHINDO
        .iter()
        .position(|s| value < s.hi)
        .unwrap_or(SHINDO.len() - 1)
}

/// The class containing `value`.
#[must_use]
pub fn class_of(value: f64) -> &'static ShindoClass {
    &SHINDO[class_index(value)]
}

/// Class label for `value`, e.g. `"5-"`.
#[must_use]
pub fn name(value: f64) -> &'static str {
    class_of(value).name
}

/// Display color for `value`.
///
/// Inside a bounded bin the color runs linearly from the previous bin's midpoint color
/// to this bin's, then on towards the next bin's. Channels are truncated towards zero.
#[must_use]
pub fn color(value: f64) -> [u8; 3] {
    let ind = class_index(value);
    let current = &SHINDO[ind];
    if ind == 0 || ind == SHINDO.len() - 1 {
        return current.rgb;
    }
    let mid = current.mid();
    let (from, to, from_mid, to_mid) = if value < mid {
        let prev = &SHINDO[ind - 1];
        (prev.rgb, current.rgb, prev.mid(), mid)
    } else {
        let next = &SHINDO[ind + 1];
        (current.rgb, next.rgb, mid, next.mid())
    };
    let t = (value - from_mid) / (to_mid - from_mid);
    let mut out = [0u8; 3];
    for ((o, &a), &b) in out.iter_mut().zip(from.iter()).zip(to.iter()) {
        let delta = (f64::from(i32::from(b) - i32::from(a)) * t) as i32;
        *o = (i32::from(a) + delta).clamp(0, 255) as u8;
    }
    out
}

/// An intensity together with its class label and display color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntensityValue {
    /// Instrumental intensity.
    pub value: f64,
    /// Label of the class containing `value`.
    pub class: &'static str,
    /// Interpolated display color.
    pub rgb: [u8; 3],
}

impl IntensityValue {
    /// Attach class and color to an intensity.
    ///
    /// ```
    /// use shm_daq::data::shindo::IntensityValue;
    ///
    /// let v = IntensityValue::classify(5.2);
    /// assert_eq!(v.class, "5+");
    /// assert_eq!(v.value, 5.2);
    /// ```
    #[must_use]
    pub fn classify(value: f64) -> Self {
        Self {
            value,
            class: name(value),
            rgb: color(value),
        }
    }
}
