//! # Decay Tracker
//!
//! Keeps an exponentially decayed history of every band sum of a block.
//! Each cycle the fresh sum `s` is blended with the stored history `h`:
//!
//! ```text
//! h <- s + (omega * h) >> 15
//! ```
//!
//! and `h` replaces the band sum. For the first `gcdefer` cycles after a
//! trial boundary the history is only seeded with the raw sums.
//!
//! History is block-owned and persistent; it is sized to the block's
//! `nbsums` and reused every cycle. Self-inhibiting blocks also keep the
//! same history of each cell's own contribution, so the decayed own part
//! can be taken back out of the decayed band 0.

use inhib_core::error::InhibResult;
use inhib_core::fixed::{clamp_to, decay_blend, BAND_SUM_CEILING};

use crate::arena::grow_zeroed;

#[derive(Clone, Debug, Default)]
pub struct DecayTracker {
    /// Persistence per cycle (S15)
    omega: i32,

    /// Cycles after a trial boundary before blending starts
    gcdefer: u16,

    /// `[band * groups + group]`
    history: Vec<i64>,

    /// Per target cell own contributions
    own: Vec<i64>,

    groups: usize,

    /// History holds at least one cycle of sums
    seeded: bool,
}

impl DecayTracker {
    pub fn new(omega: i32, gcdefer: u16) -> Self {
        Self {
            omega,
            gcdefer,
            ..Self::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.omega > 0
    }

    /// Size the history for `bands * groups` sums
    pub fn ensure(&mut self, bands: usize, groups: usize) -> InhibResult<()> {
        grow_zeroed(&mut self.history, bands * groups)?;
        if self.groups != groups {
            self.groups = groups;
            self.seeded = false;
        }
        Ok(())
    }

    /// Size the own-contribution history for `cells` target cells
    pub fn ensure_own(&mut self, cells: usize) -> InhibResult<()> {
        grow_zeroed(&mut self.own, cells)
    }

    fn seeding(&self, cycles_since_trial: u64) -> bool {
        !self.seeded || cycles_since_trial < self.gcdefer as u64
    }

    /// Blend one band's sums in place; returns the number of clamped sums
    pub fn blend(&mut self, band: usize, sums: &mut [i64], cycles_since_trial: u64) -> u64 {
        let seeding = self.seeding(cycles_since_trial);
        let start = band * self.groups;
        blend_into(&mut self.history[start..start + sums.len()], sums, self.omega, seeding)
    }

    /// Blend the own contributions of a self-inhibiting block in place
    pub fn blend_own(&mut self, own: &mut [i64], cycles_since_trial: u64) -> u64 {
        let seeding = self.seeding(cycles_since_trial);
        blend_into(&mut self.own[..own.len()], own, self.omega, seeding)
    }

    /// Mark the end of a blending pass over all bands
    pub fn finish_cycle(&mut self) {
        self.seeded = true;
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|h| *h = 0);
        self.own.iter_mut().for_each(|h| *h = 0);
        self.seeded = false;
    }

    pub fn history(&self, band: usize) -> &[i64] {
        let start = band * self.groups;
        &self.history[start..start + self.groups]
    }
}

fn blend_into(history: &mut [i64], sums: &mut [i64], omega: i32, seeding: bool) -> u64 {
    if seeding {
        history.copy_from_slice(sums);
        return 0;
    }

    let mut clamped = 0;
    for (sum, h) in sums.iter_mut().zip(history.iter_mut()) {
        let blended = clamp_to(decay_blend(*sum, *h, omega), BAND_SUM_CEILING);
        if blended.overflowed {
            clamped += 1;
        }
        *sum = blended.value;
        *h = blended.value;
    }
    clamped
}
