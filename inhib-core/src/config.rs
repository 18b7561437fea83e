//! # Configuration - Inhibition Block and Engine Parameters
//!
//! The option bitmask of a block is carried as a tagged structure with
//! named fields. The `IBOP*` bit constants remain available for callers
//! that store options packed, and [`InhibOptions::from_bits`] /
//! [`InhibOptions::bits`] convert between the two forms.
//!
//! Derived flags (`IBOEFV`) are computed once by [`InhibOptions::derive`]
//! when a block is built, never re-tested in the hot loop.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, InhibResult};
use crate::fixed::{Activity, ONE_S15, ONE_S20, ONE_S24};
use crate::layer::{LayerId, LayerShape};

/// Only positive source activity enters band sums
pub const IBOPTX: u32 = 0x0001;
/// Round surround region instead of square
pub const IBOPRS: u32 = 0x0002;
/// Combine bands by maximum instead of sum
pub const IBOPMX: u32 = 0x0004;
/// Knee response: subtract `subitt`/`subnitt` once past threshold
pub const IBOPKR: u32 = 0x0008;
/// Square the net total
pub const IBOPTQ: u32 = 0x0010;
/// Shunting (multiplicative) delivery
pub const IBOPTS: u32 = 0x0020;
/// Fast start: reset at trial boundaries, defer recomputation
pub const IBOPFS: u32 = 0x0040;
/// Allow opposite-sign (disinhibitory) results below `-ittlo`
pub const IBOPOR: u32 = 0x0080;
/// Self-avoidance through split ring-0 sums
pub const IBOPSA: u32 = 0x0100;
/// Square each source activity before summing
pub const IBOPCS: u32 = 0x0200;
/// Derived: output differs cell by cell within a group
pub const IBOEFV: u32 = 0x8000;

/// Option set of one inhibition block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InhibOptions {
    /// IBOPTX
    pub positive_only: bool,
    /// IBOPRS
    pub round: bool,
    /// IBOPMX
    pub max_combine: bool,
    /// IBOPKR
    pub knee: bool,
    /// IBOPTQ
    pub square_total: bool,
    /// IBOPTS
    pub shunting: bool,
    /// IBOPFS
    pub fast_start: bool,
    /// IBOPOR
    pub opposite_result: bool,
    /// IBOPSA
    pub self_avoid: bool,
    /// IBOPCS
    pub square_sums: bool,
}

/// Flags computed from options plus block wiring
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DerivedFlags {
    /// IBOEFV: each target cell needs its own evaluation
    pub effective_per_cell: bool,
    /// Decay history must be tracked
    pub tracks_history: bool,
    /// Autoscale multiplier is live
    pub autoscaled: bool,
}

impl InhibOptions {
    /// Unpack a bitmask; derived bits are ignored
    pub fn from_bits(bits: u32) -> Self {
        Self {
            positive_only: bits & IBOPTX != 0,
            round: bits & IBOPRS != 0,
            max_combine: bits & IBOPMX != 0,
            knee: bits & IBOPKR != 0,
            square_total: bits & IBOPTQ != 0,
            shunting: bits & IBOPTS != 0,
            fast_start: bits & IBOPFS != 0,
            opposite_result: bits & IBOPOR != 0,
            self_avoid: bits & IBOPSA != 0,
            square_sums: bits & IBOPCS != 0,
        }
    }

    /// Pack into a bitmask (without derived bits)
    pub fn bits(&self) -> u32 {
        [
            (self.positive_only, IBOPTX),
            (self.round, IBOPRS),
            (self.max_combine, IBOPMX),
            (self.knee, IBOPKR),
            (self.square_total, IBOPTQ),
            (self.shunting, IBOPTS),
            (self.fast_start, IBOPFS),
            (self.opposite_result, IBOPOR),
            (self.self_avoid, IBOPSA),
            (self.square_sums, IBOPCS),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// Compute derived flags for a block with the given wiring
    pub fn derive(&self, self_layer: bool, decay: &DecayParams, autoscale: Option<&AutoscaleParams>) -> DerivedFlags {
        DerivedFlags {
            effective_per_cell: self_layer || self.self_avoid,
            tracks_history: decay.omega > 0,
            autoscaled: autoscale.is_some(),
        }
    }
}

impl DerivedFlags {
    /// Derived bits in packed form
    pub fn bits(&self) -> u32 {
        if self.effective_per_cell {
            IBOEFV
        } else {
            0
        }
    }
}

/// Boundary condition (`kbc`) for groups outside the source layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Outside groups contribute nothing
    #[default]
    Zero,
    /// Outside groups contribute the block's `border` noise mean per cell
    Noise,
    /// Replicate the nearest edge group
    Edge,
    /// Reflect about the layer edge
    Mirror,
    /// Wrap around
    Toroidal,
    /// Zero fill, divide by in-bounds area instead of nominal area
    Norm,
}

/// Restrict target rows to one partition of the layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPartition {
    pub first_row: u16,
    pub rows: u16,
}

/// Per-band multiplier and clamp
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandParams {
    /// Multiplier (S20)
    pub beta: i32,

    /// Maximum contribution of this band (S7), 0 = unlimited
    pub mxib: i32,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            beta: ONE_S20,
            mxib: 0,
        }
    }
}

/// Decay history parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayParams {
    /// Fraction of history carried into the next cycle (S15), 0 = off
    pub omega: i32,
}

/// Autoscale policy for band multipliers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleParams {
    /// Desired mean |inhibition| per target cell (S7)
    pub target: i32,

    /// Fraction of the correction applied per cycle (S15)
    pub rate: i32,

    /// Starting multiplier (S24)
    pub initial: i32,

    /// Multiplier floor (S24)
    pub min: i32,

    /// Multiplier ceiling (S24)
    pub max: i32,

    /// Bands whose bit is set keep their raw beta (`gpspov`)
    pub gpspov: u32,
}

impl Default for AutoscaleParams {
    fn default() -> Self {
        Self {
            target: 1 << 7,
            rate: ONE_S15 / 4,
            initial: ONE_S24,
            min: ONE_S24 / 16,
            max: i32::MAX,
            gpspov: 0,
        }
    }
}

/// Everything needed to build one inhibition block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Source layer handle (`pisrc`)
    pub source: LayerId,

    /// Option set (`ibopt`)
    pub options: InhibOptions,

    /// Ring radius in groups, counting the center ring
    pub nr: u16,

    /// Rings per band beyond band 0
    pub ngb: u16,

    /// Number of bands
    pub nib: u16,

    /// Target row partition, whole layer when absent
    pub rows: Option<RowPartition>,

    /// Boundary condition (`kbc`)
    pub boundary: BoundaryKind,

    /// Noise mean per out-of-bounds cell (S7), used by `Noise`
    pub border: Activity,

    /// One entry per band
    pub bands: Vec<BandParams>,

    /// Upper threshold (S7)
    pub itt: i32,

    /// Lower threshold magnitude for opposite-sign results (S7)
    pub ittlo: i32,

    /// Knee subtraction above threshold (S7)
    pub subitt: i32,

    /// Knee subtraction below the lower threshold (S7)
    pub subnitt: i32,

    /// Shunting reversal potential (S7 mV)
    pub gjrev: i32,

    /// Cycles between computation and delivery
    pub ihdelay: u16,

    /// Cycles after a trial boundary during which prior sums are retained
    pub gdefer: u16,

    /// Cycles after a trial boundary before decay blending starts
    pub gcdefer: u16,

    /// Cycles after a fast-start reset during which autoscale is frozen
    pub gfscyc: u16,

    pub decay: DecayParams,

    pub autoscale: Option<AutoscaleParams>,

    /// Escalate overflow to a cycle error
    pub gssck: bool,

    /// Slot in the shared overflow vector
    pub iovec: Option<usize>,
}

impl BlockConfig {
    /// A plain square-surround block with `nib` bands of width `ngb`
    pub fn new(source: LayerId, nib: u16, ngb: u16) -> Self {
        let nr = 1 + nib.saturating_sub(1).saturating_mul(ngb);
        Self {
            source,
            options: InhibOptions::default(),
            nr,
            ngb,
            nib,
            rows: None,
            boundary: BoundaryKind::Zero,
            border: 0,
            bands: vec![BandParams::default(); nib as usize],
            itt: 0,
            ittlo: 0,
            subitt: 0,
            subnitt: 0,
            gjrev: 0,
            ihdelay: 0,
            gdefer: 0,
            gcdefer: 0,
            gfscyc: 0,
            decay: DecayParams::default(),
            autoscale: None,
            gssck: false,
            iovec: None,
        }
    }

    /// Parameter checks that do not depend on geometry products
    pub fn validate(&self, target: LayerId, source: &LayerShape, target_shape: &LayerShape) -> Result<(), ConfigurationError> {
        source.validate()?;
        target_shape.validate()?;
        if self.nib == 0 {
            return Err(ConfigurationError::ZeroDimension("nib"));
        }
        if self.ngb == 0 {
            return Err(ConfigurationError::ZeroDimension("ngb"));
        }
        if self.options.round && self.nr == 0 {
            return Err(ConfigurationError::RoundWithoutRadius);
        }
        if self.bands.len() != self.nib as usize {
            return Err(ConfigurationError::InvalidParameter {
                name: "bands",
                reason: format!("{} entries for {} bands", self.bands.len(), self.nib),
            });
        }
        if source.ngx != target_shape.ngx || source.ngy != target_shape.ngy {
            return Err(ConfigurationError::InvalidParameter {
                name: "source",
                reason: "source and target group grids differ".to_string(),
            });
        }
        if self.source == target && source.nel != target_shape.nel {
            return Err(ConfigurationError::SelfLayerMismatch(target));
        }
        if self.options.self_avoid && self.source != target {
            return Err(ConfigurationError::InvalidParameter {
                name: "options.self_avoid",
                reason: "self-avoidance needs the source layer to be the target layer".to_string(),
            });
        }
        if self.itt < 0 || self.ittlo < 0 || self.subitt < 0 || self.subnitt < 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "itt",
                reason: "thresholds are magnitudes and must be non-negative".to_string(),
            });
        }
        if !(0..ONE_S15).contains(&self.decay.omega) {
            return Err(ConfigurationError::InvalidParameter {
                name: "decay.omega",
                reason: format!("{} is outside [0, 1) in S15", self.decay.omega),
            });
        }
        if let Some(scale) = &self.autoscale {
            if scale.min <= 0 || scale.min > scale.max || !(scale.min..=scale.max).contains(&scale.initial) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "autoscale",
                    reason: "need 0 < min <= initial <= max".to_string(),
                });
            }
        }
        if let Some(rows) = self.rows {
            if rows.rows == 0 || rows.first_row as u32 + rows.rows as u32 > source.ngy as u32 {
                return Err(ConfigurationError::InvalidParameter {
                    name: "rows",
                    reason: format!(
                        "rows {}..{} outside layer of {} rows",
                        rows.first_row,
                        rows.first_row as u32 + rows.rows as u32,
                        source.ngy
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Scratch buffer reuse granularity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationPolicy {
    /// One scratch set per block
    #[default]
    PerBlock,
    /// One scratch set per target layer, shared by its blocks in turn
    PerCellType,
}

/// Engine-wide settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads, 0 = rayon default
    pub threads: usize,

    /// Scratch reuse granularity
    pub allocation: AllocationPolicy,

    /// Length of the shared overflow vector
    pub overflow_slots: usize,

    /// Force sign checking on every block
    pub sign_check_all: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            allocation: AllocationPolicy::PerBlock,
            overflow_slots: 16,
            sign_check_all: false,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables
    ///
    /// Reads:
    /// - INHIB_THREADS: worker threads (default: rayon default)
    /// - INHIB_ALLOC: "block" or "celltype" (default: block)
    /// - INHIB_SIGN_CHECK: "1"/"true" forces sign checking
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("INHIB_THREADS") {
            if let Ok(v) = val.parse() {
                config.threads = v;
            }
        }

        match std::env::var("INHIB_ALLOC").map(|s| s.to_lowercase()).as_deref() {
            Ok("celltype") | Ok("cell_type") => config.allocation = AllocationPolicy::PerCellType,
            Ok("block") => config.allocation = AllocationPolicy::PerBlock,
            Ok(other) => tracing::warn!("Unknown INHIB_ALLOC value {:?}, keeping per-block scratch", other),
            Err(_) => {}
        }

        config.sign_check_all = std::env::var("INHIB_SIGN_CHECK")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        config
    }
}

/// A block together with the layer that owns it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedBlock {
    pub target: LayerId,
    pub block: BlockConfig,
}

/// Complete network description: engine settings, layers, blocks
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub engine: EngineConfig,
    pub layers: Vec<LayerShape>,
    pub blocks: Vec<TargetedBlock>,
}

impl NetworkConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> InhibResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &str) -> InhibResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> LayerShape {
        LayerShape::new(8, 8, 2).unwrap()
    }

    #[test]
    fn test_option_bits_roundtrip_named_flags() {
        let bits = IBOPRS | IBOPMX | IBOPSA | IBOPCS;
        let options = InhibOptions::from_bits(bits | IBOEFV);
        assert!(options.round && options.max_combine && options.self_avoid && options.square_sums);
        assert!(!options.knee && !options.shunting);
        assert_eq!(options.bits(), bits);
    }

    #[test]
    fn test_derived_flags() {
        let options = InhibOptions::default();
        let flags = options.derive(true, &DecayParams { omega: 100 }, None);
        assert!(flags.effective_per_cell);
        assert!(flags.tracks_history);
        assert!(!flags.autoscaled);
        assert_eq!(flags.bits(), IBOEFV);
    }

    #[test]
    fn test_new_block_ring_radius() {
        let config = BlockConfig::new(LayerId(0), 3, 2);
        assert_eq!(config.nr, 5);
        assert_eq!(config.bands.len(), 3);
        assert!(config.validate(LayerId(0), &shape(), &shape()).is_ok());
    }

    #[test]
    fn test_round_without_radius_rejected() {
        let mut config = BlockConfig::new(LayerId(0), 1, 1);
        config.options.round = true;
        config.nr = 0;
        assert_eq!(
            config.validate(LayerId(0), &shape(), &shape()),
            Err(ConfigurationError::RoundWithoutRadius)
        );
    }

    #[test]
    fn test_self_avoid_needs_self_layer() {
        let mut config = BlockConfig::new(LayerId(1), 2, 1);
        config.options.self_avoid = true;
        assert!(config.validate(LayerId(0), &shape(), &shape()).is_err());
    }

    #[test]
    fn test_partition_bounds() {
        let mut config = BlockConfig::new(LayerId(0), 2, 1);
        config.rows = Some(RowPartition { first_row: 6, rows: 4 });
        assert!(config.validate(LayerId(0), &shape(), &shape()).is_err());
        config.rows = Some(RowPartition { first_row: 4, rows: 4 });
        assert!(config.validate(LayerId(0), &shape(), &shape()).is_ok());
    }

    #[test]
    fn test_network_config_json() {
        let mut network = NetworkConfig::default();
        network.layers.push(shape());
        network.blocks.push(TargetedBlock {
            target: LayerId(0),
            block: BlockConfig::new(LayerId(0), 2, 1),
        });
        let json = serde_json::to_string(&network).unwrap();
        let back: NetworkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.blocks, network.blocks);
    }
}
