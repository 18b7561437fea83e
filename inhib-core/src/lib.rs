//! # Inhib Core
//!
//! Core types for the geometric lateral-inhibition engine.
//!
//! This crate provides the fundamental building blocks:
//! - **fixed**: S-format fixed point and overflow-checked accumulation
//! - **config**: block options, band parameters, engine settings
//! - **layer**: layer handles and shapes of the host network
//! - **traits**: the activity feed and delivery seams
//! - **error**: configuration, numeric and allocation failures
//!
//! The engine itself lives in `inhib-compute`.

pub mod config;
pub mod error;
pub mod fixed;
pub mod layer;
pub mod traits;

// Re-export main types at crate root
pub use config::{
    AllocationPolicy, AutoscaleParams, BandParams, BlockConfig, BoundaryKind, DecayParams,
    DerivedFlags, EngineConfig, InhibOptions, NetworkConfig, RowPartition, TargetedBlock,
};
pub use error::{ConfigurationError, InhibResult, InhibitionError, OverflowStage};
pub use fixed::{Activity, Clamped};
pub use layer::{BlockId, LayerId, LayerRegistry, LayerShape};
pub use traits::{ActivitySource, Delivery, InhibitionSink, SliceSource, VecSink};
