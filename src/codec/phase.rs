//! Axis phase tracking across sub-packets.
//!
//! The sensor never sends explicit axis labels. Instead the sample that begins each
//! X/Y/Z triplet carries a marker bit, and consecutive sub-packets of one message may
//! overlap by up to two samples. [`AxisPhase`] records where the next X sample is
//! expected relative to the start of the next sub-packet; [`AxisPhase::resync`] compares
//! that expectation against the observed marker and tells the decoder how many leading
//! samples are duplicates.
//!
//! The transition is pure so it can be exercised without any byte handling.

/// Offset, in samples, from the start of the next sub-packet to the next X sample.
///
/// Always in `0..3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisPhase(u8);

/// Outcome of reconciling a sub-packet against the expected phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resync {
    /// Phase expected at the start of the following sub-packet.
    pub phase: AxisPhase,
    /// Number of leading samples of this sub-packet that overlap emitted data.
    pub drop: usize,
}

impl AxisPhase {
    /// Build a phase from any offset, reducing it modulo 3.
    #[must_use]
    pub fn new(offset: usize) -> Self {
        Self((offset % 3) as u8)
    }

    /// The offset in `0..3`.
    #[must_use]
    pub fn offset(self) -> usize {
        usize::from(self.0)
    }

    /// Phase after the first sub-packet of a message, which is emitted in full.
    ///
    /// `marker` is the index of the X sample inside that sub-packet and `count` the
    /// number of samples it held.
    #[must_use]
    pub fn after_first(marker: usize, count: usize) -> Self {
        Self::new(marker % 3 + 3 - count % 3)
    }

    /// Reconcile a subsequent sub-packet whose X marker sits at index `marker`.
    ///
    /// The drop count is clamped to `count`; an empty sub-packet leaves the phase as is.
    #[must_use]
    pub fn resync(self, marker: usize, count: usize) -> Resync {
        if count == 0 {
            return Resync {
                phase: self,
                drop: 0,
            };
        }
        let drop = ((marker % 3 + 3) - self.offset()) % 3;
        let drop = drop.min(count);
        let kept = count - drop;
        Resync {
            phase: Self::new(self.offset() + 3 - kept % 3),
            drop,
        }
    }
}
