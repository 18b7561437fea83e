//! # Scratch Arena
//!
//! Per-cycle temporaries (group sums, padded grid) are pooled instead of
//! reallocated every cycle. One arena serves every block; the key is the
//! block itself or the target layer ("cell type") depending on
//! [`AllocationPolicy`]. With per-cell-type reuse, all blocks of a layer
//! take turns on one scratch set, so they run one after another while
//! different layers still run in parallel.
//!
//! Buffers only grow, to the largest size any user of the key has needed.

use std::collections::HashMap;

use inhib_core::config::AllocationPolicy;
use inhib_core::error::{InhibResult, InhibitionError};
use inhib_core::layer::{BlockId, LayerId};

/// Key a scratch set is stored under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArenaKey {
    Block(BlockId),
    CellType(LayerId),
}

/// Reusable per-cycle buffers
#[derive(Debug, Default)]
pub struct Scratch {
    /// Per source group: combined sum
    pub group_sums: Vec<i64>,

    /// Per source group: excitatory part
    pub group_exc: Vec<i64>,

    /// Per source group: inhibitory magnitude
    pub group_inh: Vec<i64>,

    /// Group sums laid out in the padded grid
    pub padded: Vec<i64>,
}

/// Grow `buffer` to at least `len` zeroed elements without aborting on OOM
pub(crate) fn grow_zeroed(buffer: &mut Vec<i64>, len: usize) -> InhibResult<()> {
    if buffer.len() < len {
        buffer
            .try_reserve(len - buffer.len())
            .map_err(|_| InhibitionError::Allocation { requested: len })?;
        buffer.resize(len, 0);
    }
    Ok(())
}

impl Scratch {
    /// Make sure every buffer holds at least the requested lengths
    pub fn ensure(&mut self, groups: usize, padded: usize) -> InhibResult<()> {
        grow_zeroed(&mut self.group_sums, groups)?;
        grow_zeroed(&mut self.group_exc, groups)?;
        grow_zeroed(&mut self.group_inh, groups)?;
        grow_zeroed(&mut self.padded, padded)?;
        Ok(())
    }

    /// Elements currently held
    pub fn capacity(&self) -> usize {
        self.group_sums.len() + self.group_exc.len() + self.group_inh.len() + self.padded.len()
    }
}

/// Pool of scratch sets
#[derive(Debug, Default)]
pub struct ScratchArena {
    policy: AllocationPolicy,
    slots: HashMap<ArenaKey, Scratch>,
}

impl ScratchArena {
    pub fn new(policy: AllocationPolicy) -> Self {
        Self {
            policy,
            slots: HashMap::new(),
        }
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Key a block's scratch lives under
    pub fn key_for(&self, block: BlockId) -> ArenaKey {
        match self.policy {
            AllocationPolicy::PerBlock => ArenaKey::Block(block),
            AllocationPolicy::PerCellType => ArenaKey::CellType(block.target),
        }
    }

    /// Take a scratch set out for exclusive use during a cycle
    pub fn checkout(&mut self, key: ArenaKey) -> Scratch {
        self.slots.remove(&key).unwrap_or_default()
    }

    /// Return a scratch set after the cycle
    pub fn checkin(&mut self, key: ArenaKey, scratch: Scratch) {
        self.slots.insert(key, scratch);
    }

    /// Drop a block's scratch (only meaningful per block)
    pub fn release(&mut self, key: ArenaKey) {
        self.slots.remove(&key);
    }

    /// Total elements held across all keys
    pub fn held(&self) -> usize {
        self.slots.values().map(Scratch::capacity).sum()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
