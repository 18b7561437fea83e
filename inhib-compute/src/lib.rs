//! # Inhib Compute
//!
//! The lateral-inhibition engine, computed on the CPU with Rayon.
//!
//! This crate provides:
//! - **geometry**: ring and band layout around a target group
//! - **norm**: in-bounds band areas for the `Norm` boundary
//! - **block**: one source-to-target inhibition relationship and its cycle
//! - **engine**: all blocks of a network, run in parallel each cycle
//! - **arena**, **decay**, **overflow**: scratch reuse, band-sum history,
//!   clamp accounting
//!
//! ## Threads
//!
//! `EngineConfig::threads` (or `INHIB_THREADS`) gives the engine its own
//! Rayon pool; 0 uses the global pool.
//!
//! ## Scratch
//!
//! `EngineConfig::allocation` (or `INHIB_ALLOC`):
//! - `block` - one scratch set per block
//! - `celltype` - one per target layer, its blocks run in turn

pub mod arena;
pub mod block;
pub mod decay;
pub mod engine;
pub mod geometry;
pub mod norm;
pub mod overflow;

pub use arena::{ArenaKey, Scratch, ScratchArena};
pub use block::{accumulate_cells, BlockCycle, BlockPhase, InhibitionBand, InhibitionBlock};
pub use decay::DecayTracker;
pub use engine::{CycleStats, InhibitionEngine};
pub use geometry::{GeometryParams, RingGeometry, RoundRegion};
pub use norm::{NormalizationTable, XYNormDef};
pub use overflow::{OverflowCounters, OverflowVector};
