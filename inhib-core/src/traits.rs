//! # Traits - Seams to the Host Simulator
//!
//! The inhibition engine sits between two collaborators it does not own:
//!
//! - `ActivitySource`: read-only per-cell activity of every source layer
//! - `InhibitionSink`: receives one delivery per target cell per block
//!
//! `SliceSource` and `VecSink` are minimal in-memory implementations.

use std::collections::HashMap;

use crate::fixed::{Activity, S7};
use crate::layer::LayerId;

/// Inhibitory drive for one target cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Added to the cell's potential (S7 mV, positive = inhibitory)
    Additive(i32),
    /// Conductance-like factor applied against a reversal potential
    Shunt { factor: i32, reversal: i32 },
}

impl Default for Delivery {
    fn default() -> Self {
        Self::Additive(0)
    }
}

impl Delivery {
    /// Resulting change for a cell at potential `v` (S7)
    ///
    /// Additive drive is subtracted; a shunt pulls `v` towards the reversal
    /// potential in proportion to `factor`.
    pub fn effect_on(&self, v: i32) -> i32 {
        match *self {
            Delivery::Additive(amount) => amount.saturating_neg(),
            Delivery::Shunt { factor, reversal } => {
                let pull = (factor as i64 * (reversal as i64 - v as i64)) >> S7;
                pull.clamp(i32::MIN as i64, i32::MAX as i64) as i32
            }
        }
    }

    /// Raw magnitude regardless of kind
    pub fn magnitude(&self) -> i32 {
        match *self {
            Delivery::Additive(amount) => amount,
            Delivery::Shunt { factor, .. } => factor,
        }
    }
}

/// Supplies per-cycle activity for source layers
pub trait ActivitySource: Sync {
    /// Activity of every cell of `layer`, group-major order
    fn activity(&self, layer: LayerId) -> Option<&[Activity]>;
}

/// Consumes per-cycle inhibition for target layers
pub trait InhibitionSink {
    /// One value per target cell of the block's row partition
    fn deliver(&mut self, target: LayerId, block: usize, values: &[Delivery]);
}

/// Activity held in memory, one slice per layer
#[derive(Clone, Debug, Default)]
pub struct SliceSource {
    layers: HashMap<LayerId, Vec<Activity>>,
}

impl SliceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, layer: LayerId, activity: Vec<Activity>) {
        self.layers.insert(layer, activity);
    }

    pub fn get_mut(&mut self, layer: LayerId) -> Option<&mut Vec<Activity>> {
        self.layers.get_mut(&layer)
    }
}

impl ActivitySource for SliceSource {
    fn activity(&self, layer: LayerId) -> Option<&[Activity]> {
        self.layers.get(&layer).map(|v| v.as_slice())
    }
}

/// Keeps the latest delivery of every block
#[derive(Clone, Debug, Default)]
pub struct VecSink {
    latest: HashMap<(LayerId, usize), Vec<Delivery>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, target: LayerId, block: usize) -> Option<&[Delivery]> {
        self.latest.get(&(target, block)).map(|v| v.as_slice())
    }
}

impl InhibitionSink for VecSink {
    fn deliver(&mut self, target: LayerId, block: usize, values: &[Delivery]) {
        let slot = self.latest.entry((target, block)).or_default();
        slot.clear();
        slot.extend_from_slice(values);
    }
}
