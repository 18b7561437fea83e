//! # Inhibition Engine
//!
//! Owns every block of the network, grouped by target layer, and runs
//! them once per cycle.
//!
//! ## Cycle
//!
//! 1. Blocks are grouped into work units by their scratch key. Units run
//!    in parallel; blocks inside a unit share one scratch set and run in
//!    order.
//! 2. When every unit is done, outputs are handed to the sink layer by
//!    layer, block by block.
//!
//! Source activity is shared read-only; each block is mutated by exactly
//! one task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use inhib_core::config::{BlockConfig, EngineConfig, NetworkConfig};
use inhib_core::error::{ConfigurationError, InhibResult, InhibitionError};
use inhib_core::layer::{BlockId, LayerId, LayerRegistry, LayerShape};
use inhib_core::traits::{ActivitySource, InhibitionSink};

use crate::arena::{ArenaKey, Scratch, ScratchArena};
use crate::block::InhibitionBlock;
use crate::overflow::{OverflowCounters, OverflowVector};

/// Statistics for one engine cycle
#[derive(Clone, Debug, Default, Serialize)]
pub struct CycleStats {
    /// Cycle number, starting at 0
    pub cycle: u64,

    pub blocks: usize,

    /// Target cells computed across all blocks
    pub cells: usize,

    /// Blocks that reused prior band sums
    pub retained: usize,

    pub overflows: OverflowCounters,

    pub compute_time_us: u64,
}

/// Blocks sharing one scratch set
struct WorkUnit<'a> {
    key: ArenaKey,
    blocks: Vec<&'a mut InhibitionBlock>,
    scratch: Scratch,
}

/// Run each unit's blocks in order, units in parallel
fn run_units(
    units: &mut [WorkUnit<'_>],
    source: &dyn ActivitySource,
    overflow: &OverflowVector,
) -> Vec<InhibResult<CycleStats>> {
    units
        .par_iter_mut()
        .map(|unit| {
            let mut stats = CycleStats::default();
            for block in unit.blocks.iter_mut() {
                let activity = source
                    .activity(block.source())
                    .ok_or(InhibitionError::MissingActivity(block.source()))?;
                let result = block.run_cycle(activity, &mut unit.scratch, overflow)?;
                stats.blocks += 1;
                stats.cells += result.cells;
                stats.retained += result.retained as usize;
                stats.overflows += result.overflows;
            }
            Ok(stats)
        })
        .collect()
}

/// Runs all inhibition blocks of a network
pub struct InhibitionEngine {
    registry: LayerRegistry,
    config: EngineConfig,

    /// Blocks per target layer, indexed by `LayerId`
    layers: Vec<Vec<InhibitionBlock>>,

    arena: ScratchArena,
    overflow: OverflowVector,
    pool: Option<rayon::ThreadPool>,
    cycle: AtomicU64,
}

impl InhibitionEngine {
    /// Create an engine with no blocks
    pub fn new(registry: LayerRegistry, config: EngineConfig) -> InhibResult<Self> {
        let pool = if config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("inhib-{}", i))
                .build()
                .map_err(|e| InhibitionError::invalid("threads", e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        tracing::info!(
            "Inhibition engine: {} layers, {} threads, {:?} scratch, {} overflow slots",
            registry.len(),
            if config.threads > 0 {
                config.threads
            } else {
                rayon::current_num_threads()
            },
            config.allocation,
            config.overflow_slots
        );

        Ok(Self {
            layers: (0..registry.len()).map(|_| Vec::new()).collect(),
            arena: ScratchArena::new(config.allocation),
            overflow: OverflowVector::new(config.overflow_slots),
            registry,
            config,
            pool,
            cycle: AtomicU64::new(0),
        })
    }

    /// Build an engine with every layer and block of a network description
    pub fn from_network(network: &NetworkConfig) -> InhibResult<Self> {
        let mut registry = LayerRegistry::new();
        for shape in &network.layers {
            registry.register(*shape);
        }
        let mut engine = Self::new(registry, network.engine.clone())?;
        for entry in &network.blocks {
            engine.add_block(entry.target, entry.block.clone())?;
        }
        Ok(engine)
    }

    /// Register a layer after construction
    pub fn register_layer(&mut self, shape: LayerShape) -> LayerId {
        self.layers.push(Vec::new());
        self.registry.register(shape)
    }

    /// Attach a new block to `target`
    pub fn add_block(&mut self, target: LayerId, config: BlockConfig) -> InhibResult<BlockId> {
        let config = self.prepare(config)?;
        let target_shape = self.registry.shape(target)?;
        let source_shape = self.registry.shape(config.source)?;

        let blocks = &mut self.layers[target.0 as usize];
        let id = BlockId {
            target,
            index: blocks.len() as u32,
        };
        blocks.push(InhibitionBlock::new(id, config, source_shape, target_shape)?);
        Ok(id)
    }

    /// Replace a block's configuration and rebuild its tables
    pub fn rebuild(&mut self, target: LayerId, index: usize, config: BlockConfig) -> InhibResult<()> {
        let config = self.prepare(config)?;
        let source_shape = self.registry.shape(config.source)?;
        let block = self
            .layers
            .get_mut(target.0 as usize)
            .and_then(|blocks| blocks.get_mut(index))
            .ok_or_else(|| InhibitionError::invalid("index", format!("no block {} on layer {}", index, target.0)))?;
        block.rebuild(config, source_shape)?;

        // per-block scratch may be far larger than the new geometry needs
        let key = self.arena.key_for(block.id());
        if let ArenaKey::Block(_) = key {
            self.arena.release(key);
        }
        Ok(())
    }

    /// Engine-wide adjustments applied to every incoming block config
    fn prepare(&self, mut config: BlockConfig) -> InhibResult<BlockConfig> {
        if let Some(slot) = config.iovec {
            if slot >= self.overflow.len() {
                return Err(ConfigurationError::InvalidParameter {
                    name: "iovec",
                    reason: format!("slot {} outside overflow vector of {}", slot, self.overflow.len()),
                }
                .into());
            }
        }
        if self.config.sign_check_all {
            config.gssck = true;
        }
        Ok(config)
    }

    /// Run every block once and deliver the results
    pub fn cycle(&mut self, source: &dyn ActivitySource, sink: &mut dyn InhibitionSink) -> InhibResult<CycleStats> {
        let start = Instant::now();
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst);

        // === Work units ===
        let mut units: Vec<WorkUnit> = Vec::new();
        let mut slots: HashMap<ArenaKey, usize> = HashMap::new();
        for blocks in self.layers.iter_mut() {
            for block in blocks.iter_mut() {
                let key = self.arena.key_for(block.id());
                let slot = *slots.entry(key).or_insert_with(|| {
                    units.push(WorkUnit {
                        key,
                        blocks: Vec::new(),
                        scratch: self.arena.checkout(key),
                    });
                    units.len() - 1
                });
                units[slot].blocks.push(block);
            }
        }

        // === Compute ===
        let overflow = &self.overflow;
        let results = match &self.pool {
            Some(pool) => pool.install(|| run_units(&mut units, source, overflow)),
            None => run_units(&mut units, source, overflow),
        };

        for unit in units {
            self.arena.checkin(unit.key, unit.scratch);
        }

        let mut stats = CycleStats {
            cycle,
            ..CycleStats::default()
        };
        for result in results {
            let unit = result?;
            stats.blocks += unit.blocks;
            stats.cells += unit.cells;
            stats.retained += unit.retained;
            stats.overflows += unit.overflows;
        }

        // === Deliver ===
        for (layer, blocks) in self.layers.iter_mut().enumerate() {
            for (index, block) in blocks.iter_mut().enumerate() {
                sink.deliver(LayerId(layer as u32), index, block.output());
                block.mark_delivered();
            }
        }

        stats.compute_time_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            "Cycle {}: {} blocks, {} cells, {} retained, {} overflows in {}us",
            cycle,
            stats.blocks,
            stats.cells,
            stats.retained,
            stats.overflows.total(),
            stats.compute_time_us
        );
        Ok(stats)
    }

    /// Mark a trial boundary on every block
    pub fn new_trial(&mut self) {
        for block in self.layers.iter_mut().flatten() {
            block.new_trial();
        }
        tracing::debug!("New trial at cycle {}", self.cycle.load(Ordering::SeqCst));
    }

    pub fn blocks_for(&self, target: LayerId) -> &[InhibitionBlock] {
        self.layers
            .get(target.0 as usize)
            .map(|blocks| blocks.as_slice())
            .unwrap_or(&[])
    }

    pub fn block(&self, id: BlockId) -> Option<&InhibitionBlock> {
        self.layers.get(id.target.0 as usize)?.get(id.index as usize)
    }

    pub fn overflow_vector(&self) -> &OverflowVector {
        &self.overflow
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn arena(&self) -> &ScratchArena {
        &self.arena
    }

    /// Cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inhib_core::config::{AllocationPolicy, TargetedBlock};
    use inhib_core::traits::{Delivery, SliceSource, VecSink};

    fn engine(allocation: AllocationPolicy) -> (InhibitionEngine, LayerId, LayerId) {
        let mut registry = LayerRegistry::new();
        let a = registry.register(LayerShape::new(4, 4, 2).unwrap());
        let b = registry.register(LayerShape::new(4, 4, 1).unwrap());
        let config = EngineConfig {
            allocation,
            ..EngineConfig::default()
        };
        (InhibitionEngine::new(registry, config).unwrap(), a, b)
    }

    #[test]
    fn test_add_block_checks_layers() {
        let (mut engine, a, b) = engine(AllocationPolicy::PerBlock);
        let id = engine.add_block(b, BlockConfig::new(a, 2, 1)).unwrap();
        assert_eq!(id, BlockId { target: b, index: 0 });
        assert_eq!(engine.blocks_for(b).len(), 1);
        assert!(engine.blocks_for(LayerId(7)).is_empty());

        let err = engine.add_block(b, BlockConfig::new(LayerId(9), 2, 1)).unwrap_err();
        assert!(matches!(
            err,
            InhibitionError::Configuration(ConfigurationError::UnknownLayer(LayerId(9)))
        ));

        let mut config = BlockConfig::new(a, 2, 1);
        config.iovec = Some(99);
        assert!(engine.add_block(b, config).is_err());
    }

    #[test]
    fn test_cycle_delivers_every_block() {
        let (mut engine, a, b) = engine(AllocationPolicy::PerBlock);
        engine.add_block(b, BlockConfig::new(a, 2, 1)).unwrap();
        engine.add_block(a, BlockConfig::new(a, 2, 1)).unwrap();
        engine.add_block(a, BlockConfig::new(b, 1, 1)).unwrap();

        let mut source = SliceSource::new();
        source.set(a, vec![128; 32]);
        source.set(b, vec![256; 16]);
        let mut sink = VecSink::new();

        let stats = engine.cycle(&source, &mut sink).unwrap();
        assert_eq!(stats.cycle, 0);
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.cells, 16 + 32 + 32);
        assert_eq!(sink.latest(b, 0).map(|v| v.len()), Some(16));
        assert_eq!(sink.latest(a, 1), Some(&[Delivery::Additive(256); 32][..]));
        assert_eq!(engine.cycles(), 1);
    }

    #[test]
    fn test_cell_type_scratch_is_shared() {
        let (mut engine, a, b) = engine(AllocationPolicy::PerCellType);
        engine.add_block(b, BlockConfig::new(a, 2, 1)).unwrap();
        engine.add_block(b, BlockConfig::new(a, 3, 1)).unwrap();

        let mut source = SliceSource::new();
        source.set(a, vec![64; 32]);
        engine.cycle(&source, &mut VecSink::new()).unwrap();
        assert_eq!(engine.arena().len(), 1);
    }

    #[test]
    fn test_missing_activity() {
        let (mut engine, a, b) = engine(AllocationPolicy::PerBlock);
        engine.add_block(b, BlockConfig::new(a, 2, 1)).unwrap();
        let err = engine.cycle(&SliceSource::new(), &mut VecSink::new()).unwrap_err();
        assert!(matches!(err, InhibitionError::MissingActivity(layer) if layer == a));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_sign_check_all_forces_gssck() {
        let (mut engine, a, b) = engine(AllocationPolicy::PerBlock);
        engine.config.sign_check_all = true;
        let id = engine.add_block(b, BlockConfig::new(a, 2, 1)).unwrap();
        assert!(engine.block(id).unwrap().config().gssck);
    }

    #[test]
    fn test_rebuild_replaces_geometry() {
        let (mut engine, a, b) = engine(AllocationPolicy::PerBlock);
        engine.add_block(b, BlockConfig::new(a, 2, 1)).unwrap();
        engine.rebuild(b, 0, BlockConfig::new(a, 3, 1)).unwrap();
        assert_eq!(engine.blocks_for(b)[0].bands().len(), 3);
        assert!(engine.rebuild(b, 4, BlockConfig::new(a, 2, 1)).is_err());
    }

    #[test]
    fn test_register_layer_later() {
        let (mut engine, a, _) = engine(AllocationPolicy::PerBlock);
        let c = engine.register_layer(LayerShape::new(4, 4, 3).unwrap());
        assert_eq!(c, LayerId(2));
        engine.add_block(c, BlockConfig::new(a, 2, 1)).unwrap();
        assert_eq!(engine.blocks_for(c)[0].cells(), 48);
    }

    #[test]
    fn test_empty_groups_rejected_before_cycling() {
        let json = r#"{"layers":[{"ngx":2,"ngy":2,"nel":0}],"blocks":[]}"#;
        assert!(serde_json::from_str::<NetworkConfig>(json).is_err());

        // shapes built field by field skip `LayerShape::new`
        let (mut engine, a, _) = engine(AllocationPolicy::PerBlock);
        let empty = engine.register_layer(LayerShape { ngx: 4, ngy: 4, nel: 0 });
        let err = engine.add_block(empty, BlockConfig::new(a, 2, 1)).unwrap_err();
        assert!(matches!(
            err,
            InhibitionError::Configuration(ConfigurationError::ZeroDimension("nel"))
        ));
    }

    #[test]
    fn test_dedicated_pool_and_network_config() {
        let mut network = NetworkConfig::default();
        network.engine.threads = 2;
        network.layers.push(LayerShape::new(3, 3, 1).unwrap());
        network.blocks.push(TargetedBlock {
            target: LayerId(0),
            block: BlockConfig::new(LayerId(0), 2, 1),
        });
        let mut engine = InhibitionEngine::from_network(&network).unwrap();

        let mut source = SliceSource::new();
        source.set(LayerId(0), vec![128; 9]);
        let mut sink = VecSink::new();
        engine.cycle(&source, &mut sink).unwrap();
        engine.new_trial();
        let stats = engine.cycle(&source, &mut sink).unwrap();
        assert_eq!(stats.cycle, 1);
        assert_eq!(sink.latest(LayerId(0), 0).map(|v| v.len()), Some(9));
    }
}
