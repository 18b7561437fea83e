//! # Overflow Accounting
//!
//! Numeric overflow is clamped, never wrapped. Every clamp is counted per
//! block and per pipeline stage, and mirrored into a shared
//! [`OverflowVector`] slot when the block has one (`iovec`).

use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use inhib_core::error::OverflowStage;

/// Shared diagnostic counters, addressed by slot
#[derive(Clone, Debug)]
pub struct OverflowVector {
    slots: Arc<[AtomicU64]>,
}

impl OverflowVector {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Add `count` to a slot; out-of-range slots are ignored
    pub fn increment(&self, slot: usize, count: u64) {
        if let Some(counter) = self.slots.get(slot) {
            counter.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn get(&self, slot: usize) -> u64 {
        self.slots
            .get(slot)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of every slot
    pub fn snapshot(&self) -> Vec<u64> {
        self.slots.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

/// Clamp counts by stage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OverflowCounters {
    /// Band sums held at the ceiling (accumulation and decay)
    pub band_sum: u64,

    /// Saturated `asbeta` or weighted band products
    pub asbeta: u64,

    /// Combined totals narrowed to the output range
    pub combined: u64,
}

impl OverflowCounters {
    pub fn total(&self) -> u64 {
        self.band_sum + self.asbeta + self.combined
    }

    pub fn stage(&self, stage: OverflowStage) -> u64 {
        match stage {
            OverflowStage::BandSum => self.band_sum,
            OverflowStage::Multiplier => self.asbeta,
            OverflowStage::Combined => self.combined,
        }
    }
}

impl Add for OverflowCounters {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            band_sum: self.band_sum + other.band_sum,
            asbeta: self.asbeta + other.asbeta,
            combined: self.combined + other.combined,
        }
    }
}

impl AddAssign for OverflowCounters {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_is_shared_between_clones() {
        let vector = OverflowVector::new(4);
        let clone = vector.clone();
        clone.increment(2, 3);
        vector.increment(2, 1);
        vector.increment(9, 1);
        assert_eq!(vector.get(2), 4);
        assert_eq!(vector.snapshot(), vec![0, 0, 4, 0]);
    }

    #[test]
    fn test_counter_sum() {
        let a = OverflowCounters {
            band_sum: 1,
            asbeta: 0,
            combined: 2,
        };
        let mut b = a;
        b += a;
        assert_eq!(b.total(), 6);
        assert_eq!(b.stage(OverflowStage::Combined), 4);
    }
}
