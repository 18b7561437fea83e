//! # Error Types for the Inhibition Engine
//!
//! Three families matter:
//! - **Configuration**: fatal at block construction (bad geometry, bad options)
//! - **Numeric**: overflow is normally clamped and counted; it only becomes
//!   an error when sign checking is switched on for the block
//! - **Allocation**: scratch or history growth failed, fatal for the run

use thiserror::Error;

use crate::layer::LayerId;

/// Structural problems found while building or rebuilding a block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A derived geometric product does not fit in 32 bits
    #[error("geometry product {product} overflows 32 bits ({lhs} x {rhs})")]
    GeometryOverflow {
        product: &'static str,
        lhs: u64,
        rhs: u64,
    },

    /// Ring radius disagrees with band count and band width
    #[error("ring radius {nr} does not match 1 + (nib - 1) * ngb = {expected}")]
    RingMismatch { nr: u16, expected: u32 },

    /// Round surround requested without a radius
    #[error("round surround requested with zero ring radius")]
    RoundWithoutRadius,

    /// A dimension that must be positive is zero
    #[error("{0} must be non-zero")]
    ZeroDimension(&'static str),

    /// Layer handle not present in the registry
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerId),

    /// Self-inhibition needs source and target to share one shape
    #[error("self-inhibition on {0:?} requires identical source and target shapes")]
    SelfLayerMismatch(LayerId),

    /// Any other out-of-range parameter
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Stage of the per-cycle pipeline where a clamp happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowStage {
    BandSum,
    Multiplier,
    Combined,
}

/// Main error type for inhibition operations
#[derive(Error, Debug)]
pub enum InhibitionError {
    /// Block construction failed
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Overflow escalated by sign checking
    #[error("Overflow in block {block} at {stage:?}")]
    Overflow { block: u32, stage: OverflowStage },

    /// A band sum has a sign its inputs cannot produce
    #[error("Inconsistent sign in block {block}, band {band}")]
    SignCheck { block: u32, band: usize },

    /// Scratch or history buffer could not grow
    #[error("Allocation of {requested} elements failed")]
    Allocation { requested: usize },

    /// Activity feed has nothing for a source layer
    #[error("No activity supplied for {0:?}")]
    MissingActivity(LayerId),

    /// Activity feed has the wrong number of cells
    #[error("Activity for {layer:?} has {actual} cells, expected {expected}")]
    ActivityLength {
        layer: LayerId,
        expected: usize,
        actual: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for inhibition operations
pub type InhibResult<T> = Result<T, InhibitionError>;

impl InhibitionError {
    /// Create an invalid-parameter configuration error
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::InvalidParameter {
            name,
            reason: reason.into(),
        })
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// True for errors that abort the whole run rather than one cycle
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MissingActivity(_) | Self::ActivityLength { .. }
        )
    }
}

impl From<serde_json::Error> for InhibitionError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
