//! # Inhibition Block
//!
//! One block computes the lateral inhibition a target layer receives from
//! one source layer. Each cycle runs through:
//!
//! ```text
//! Reset -> Accumulating -> Combined -> Delivered
//! ```
//!
//! ## Accumulating
//!
//! Source cells are summed per group (squared when `square_sums`), the
//! group sums are laid out in a padded grid filled according to the
//! boundary policy, and every band sum becomes a gather of padded entries
//! around the target group. Decay history is blended in afterwards.
//!
//! ## Combined
//!
//! Each band is weighted by `asbeta / area`, the bands are summed (or the
//! largest is taken), then threshold, knee, squaring and shunting shape the
//! per-cell result. Frames pass through the delay line before delivery.
//!
//! Band sums are i64 held under [`BAND_SUM_CEILING`]; every clamp is
//! counted, and with `gssck` it aborts the cycle instead.

use std::collections::VecDeque;

use rayon::prelude::*;

use inhib_core::config::{BlockConfig, BoundaryKind, DerivedFlags, InhibOptions, RowPartition};
use inhib_core::error::{ConfigurationError, InhibResult, InhibitionError, OverflowStage};
use inhib_core::fixed::{
    accumulate, clamp_to, scale_beta, square_output, square_s7, to_output, weighted_band, Activity, BAND_SUM_CEILING,
    ONE_S24, OUTPUT_CEILING, S15,
};
use inhib_core::layer::{BlockId, LayerId, LayerShape};
use inhib_core::traits::Delivery;

use crate::arena::{grow_zeroed, Scratch};
use crate::decay::DecayTracker;
use crate::geometry::{GeometryParams, RingGeometry};
use crate::norm::NormalizationTable;
use crate::overflow::{OverflowCounters, OverflowVector};

/// Where a block is in its cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockPhase {
    Reset,
    Accumulating,
    Combined,
    Delivered,
}

/// Per-band state
#[derive(Clone, Debug)]
pub struct InhibitionBand {
    /// One sum per target group of the partition
    pub sums: Vec<i64>,

    /// Nominal area in source cells
    pub barea: u32,

    /// Configured multiplier (S20)
    pub beta: i32,

    /// Multiplier in effect this cycle (S20)
    pub asbeta: i32,

    /// Contribution clamp (S7), 0 = unlimited
    pub mxib: i32,
}

/// Outcome of one block cycle
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockCycle {
    pub overflows: OverflowCounters,

    /// Prior band sums were reused instead of recomputed
    pub retained: bool,

    /// Target cells computed
    pub cells: usize,
}

/// Amount a source cell adds to its group sum
pub fn contribution(activity: Activity, options: &InhibOptions) -> i64 {
    if options.positive_only && activity <= 0 {
        return 0;
    }
    if options.square_sums {
        square_s7(activity)
    } else {
        activity as i64
    }
}

/// Sum cells into per-group excitatory and inhibitory parts
///
/// `cells` yields `(cell index, activity)` in any order; the cell index is
/// relative to `exc[0]`. Returns the number of clamped additions.
pub fn accumulate_cells<I>(cells: I, nel: usize, options: &InhibOptions, exc: &mut [i64], inh: &mut [i64]) -> u64
where
    I: IntoIterator<Item = (usize, Activity)>,
{
    exc.iter_mut().for_each(|v| *v = 0);
    inh.iter_mut().for_each(|v| *v = 0);

    let mut clamps = 0;
    for (cell, activity) in cells {
        let group = cell / nel;
        let value = contribution(activity, options);
        let (slot, amount) = if value >= 0 {
            (&mut exc[group], value)
        } else {
            (&mut inh[group], -value)
        };
        let c = accumulate(*slot, amount, BAND_SUM_CEILING);
        clamps += c.overflowed as u64;
        *slot = c.value;
    }
    clamps
}

/// Source group feeding padded position `(sx, sy)`, `None` when it is empty
pub fn boundary_source(sx: i64, sy: i64, ngx: i64, ngy: i64, boundary: BoundaryKind) -> Option<(i64, i64)> {
    if (0..ngx).contains(&sx) && (0..ngy).contains(&sy) {
        return Some((sx, sy));
    }
    match boundary {
        BoundaryKind::Edge => Some((sx.clamp(0, ngx - 1), sy.clamp(0, ngy - 1))),
        BoundaryKind::Mirror => Some((reflect(sx, ngx), reflect(sy, ngy))),
        BoundaryKind::Toroidal => Some((sx.rem_euclid(ngx), sy.rem_euclid(ngy))),
        BoundaryKind::Zero | BoundaryKind::Noise | BoundaryKind::Norm => None,
    }
}

fn reflect(i: i64, n: i64) -> i64 {
    let m = i.rem_euclid(2 * n);
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

fn overridden(gpspov: u32, band: usize) -> bool {
    band < 32 && gpspov & (1 << band) != 0
}

/// Read-only view used while combining bands
struct Combiner<'a> {
    bands: &'a [InhibitionBand],
    norm: Option<&'a NormalizationTable>,
    rnsums: &'a [Vec<i64>; 2],
    config: &'a BlockConfig,
}

impl Combiner<'_> {
    /// Result for one target cell of `group`
    ///
    /// `own` is the cell's own contribution when it must leave band 0.
    fn evaluate(&self, group: usize, own: Option<i64>) -> (Delivery, OverflowCounters) {
        let options = &self.config.options;
        let mut counters = OverflowCounters::default();
        let mut total: i64 = if options.max_combine { i64::MIN } else { 0 };

        for (b, band) in self.bands.iter().enumerate() {
            let mut sum = band.sums[group];
            let mut area = match self.norm {
                Some(norm) => norm.area(group, b),
                None => band.barea,
            };

            if let (0, Some(own)) = (b, own) {
                if options.self_avoid {
                    let exc = self.rnsums[0][group];
                    let inh = self.rnsums[1][group];
                    sum = if own >= 0 { exc - own - inh } else { exc - (inh + own) };
                    area = area.saturating_sub(1).max(1);
                } else {
                    sum -= own;
                }
            }

            let weighted = weighted_band(sum, band.asbeta, area);
            counters.asbeta += weighted.overflowed as u64;
            let mut w = weighted.value;
            if band.mxib > 0 {
                w = w.clamp(-(band.mxib as i64), band.mxib as i64);
            }

            if options.max_combine {
                total = total.max(w);
            } else {
                let c = accumulate(total, w, OUTPUT_CEILING);
                counters.combined += c.overflowed as u64;
                total = c.value;
            }
        }

        let c = self.config;
        let net = if total >= c.itt as i64 {
            let cut = if options.knee { c.subitt } else { c.itt };
            (total - cut as i64).max(0)
        } else if options.opposite_result && total <= -(c.ittlo as i64) {
            let cut = if options.knee { c.subnitt } else { c.ittlo };
            (total + cut as i64).min(0)
        } else {
            0
        };

        let narrowed = to_output(net);
        counters.combined += narrowed.overflowed as u64;
        let mut out = narrowed.value;
        if options.square_total {
            let squared = square_output(out);
            counters.combined += squared.overflowed as u64;
            out = squared.value;
        }

        let delivery = if options.shunting {
            Delivery::Shunt {
                factor: out,
                reversal: c.gjrev,
            }
        } else {
            Delivery::Additive(out)
        };
        (delivery, counters)
    }
}

/// Lateral inhibition from one source layer onto one target layer
#[derive(Debug)]
pub struct InhibitionBlock {
    id: BlockId,
    config: BlockConfig,
    source_shape: LayerShape,
    target_shape: LayerShape,
    flags: DerivedFlags,
    self_layer: bool,

    geometry: RingGeometry,
    norm: Option<NormalizationTable>,
    bands: Vec<InhibitionBand>,

    /// Ring-0 excitatory and inhibitory sums (self-avoidance)
    rnsums: [Vec<i64>; 2],
    r0sum: Vec<i64>,

    /// Own contribution of each target cell, taken with the band sums
    own: Vec<i64>,

    decay: DecayTracker,

    /// Autoscale multiplier (S24)
    gbcm: i32,
    /// Cycles left with autoscale frozen
    frozen: u16,

    delay: VecDeque<Vec<Delivery>>,
    /// Frame buffers dropped from the delay line, reused while it refills
    spare: Vec<Vec<Delivery>>,
    /// Deliver the first frame while the delay line fills
    priming: bool,
    frame: Vec<Delivery>,
    output: Vec<Delivery>,

    /// Target cells of the partition
    cells: usize,

    overflows: OverflowCounters,
    phase: BlockPhase,
    trial_cycles: u64,
    sums_valid: bool,
}

impl InhibitionBlock {
    /// Validate a configuration and build the block's tables
    pub fn new(id: BlockId, config: BlockConfig, source_shape: LayerShape, target_shape: LayerShape) -> InhibResult<Self> {
        config.validate(id.target, &source_shape, &target_shape)?;

        let rows = config.rows.unwrap_or(RowPartition {
            first_row: 0,
            rows: source_shape.ngy,
        });
        let geometry = RingGeometry::build(GeometryParams {
            ngx: source_shape.ngx,
            ngy: source_shape.ngy,
            nel: source_shape.nel,
            nr: config.nr,
            ngb: config.ngb,
            nib: config.nib,
            first_row: rows.first_row,
            mgy: rows.rows,
            round: config.options.round,
        })?;

        let norm = match config.boundary {
            BoundaryKind::Norm => Some(NormalizationTable::build(&geometry)?),
            _ => None,
        };

        let nel = source_shape.nel as u32;
        let bands = geometry
            .bands
            .iter()
            .zip(&config.bands)
            .map(|(shape, params)| {
                let barea = shape.groups().checked_mul(nel).ok_or(ConfigurationError::GeometryOverflow {
                    product: "barea",
                    lhs: shape.groups() as u64,
                    rhs: nel as u64,
                })?;
                Ok(InhibitionBand {
                    sums: Vec::new(),
                    barea,
                    beta: params.beta,
                    asbeta: params.beta,
                    mxib: params.mxib,
                })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        let cells = geometry
            .ngrp
            .checked_mul(target_shape.nel as u32)
            .ok_or(ConfigurationError::GeometryOverflow {
                product: "target cells",
                lhs: geometry.ngrp as u64,
                rhs: target_shape.nel as u64,
            })? as usize;

        let self_layer = config.source == id.target;
        let flags = config.options.derive(self_layer, &config.decay, config.autoscale.as_ref());
        let fast_start = config.options.fast_start;

        tracing::info!(
            "Built inhibition block {}/{}: source {}, {} bands x {} rings, {} target groups, {:?} boundary",
            id.target.0,
            id.index,
            config.source.0,
            config.nib,
            config.ngb,
            geometry.ngrp,
            config.boundary
        );

        Ok(Self {
            id,
            decay: DecayTracker::new(config.decay.omega, config.gcdefer),
            gbcm: config.autoscale.map(|a| a.initial).unwrap_or(ONE_S24),
            frozen: if fast_start { config.gfscyc } else { 0 },
            config,
            source_shape,
            target_shape,
            flags,
            self_layer,
            geometry,
            norm,
            bands,
            rnsums: [Vec::new(), Vec::new()],
            r0sum: Vec::new(),
            own: Vec::new(),
            delay: VecDeque::new(),
            spare: Vec::new(),
            priming: fast_start,
            frame: Vec::new(),
            output: Vec::new(),
            cells,
            overflows: OverflowCounters::default(),
            phase: BlockPhase::Reset,
            trial_cycles: 0,
            sums_valid: false,
        })
    }

    /// Replace the configuration, rebuilding every table
    pub fn rebuild(&mut self, config: BlockConfig, source_shape: LayerShape) -> InhibResult<()> {
        let rebuilt = Self::new(self.id, config, source_shape, self.target_shape)?;
        *self = rebuilt;
        tracing::info!("Rebuilt inhibition block {}/{}", self.id.target.0, self.id.index);
        Ok(())
    }

    /// Run one cycle against the source layer's activity
    ///
    /// The result is held in [`output`](Self::output) until the engine
    /// delivers it.
    pub fn run_cycle(&mut self, activity: &[Activity], scratch: &mut Scratch, overflow: &OverflowVector) -> InhibResult<BlockCycle> {
        let expected = self.source_shape.cells();
        if activity.len() != expected {
            return Err(InhibitionError::ActivityLength {
                layer: self.config.source,
                expected,
                actual: activity.len(),
            });
        }

        let mut counters = OverflowCounters::default();
        self.phase = BlockPhase::Accumulating;

        let retained =
            self.config.options.fast_start && self.trial_cycles < self.config.gdefer as u64 && self.sums_valid;
        if !retained {
            counters.band_sum += self.accumulate(activity, scratch)?;
            counters.band_sum += self.blend_history()?;
            self.sums_valid = true;
            self.check_signs()?;
        }
        self.escalate(OverflowStage::BandSum, &counters, overflow)?;

        counters.asbeta += self.update_multipliers();
        counters += self.combine();
        self.phase = BlockPhase::Combined;
        self.escalate(OverflowStage::Multiplier, &counters, overflow)?;
        self.escalate(OverflowStage::Combined, &counters, overflow)?;

        self.update_autoscale();
        self.advance_delay();
        self.trial_cycles += 1;
        self.record(&counters, overflow);

        Ok(BlockCycle {
            overflows: counters,
            retained,
            cells: self.cells,
        })
    }

    /// Start a new trial
    ///
    /// Fast-start blocks go back to `Reset`: decay history and the delay
    /// line are cleared and autoscale freezes for `gfscyc` cycles. Band
    /// sums and the own contributions taken with them survive so `gdefer`
    /// can reuse them.
    pub fn new_trial(&mut self) {
        self.trial_cycles = 0;
        if self.config.options.fast_start {
            self.phase = BlockPhase::Reset;
            self.decay.reset();
            self.spare.extend(self.delay.drain(..));
            self.priming = true;
            self.frozen = self.config.gfscyc;
        }
    }

    pub fn mark_delivered(&mut self) {
        self.phase = BlockPhase::Delivered;
    }

    // === Accumulating ===

    fn accumulate(&mut self, activity: &[Activity], scratch: &mut Scratch) -> InhibResult<u64> {
        let geometry = &self.geometry;
        let options = self.config.options;
        let ngx = self.source_shape.ngx as usize;
        let nel = self.source_shape.nel as usize;
        let groups = self.source_shape.groups();
        let padded_len = geometry.l1n2 as usize;
        let ngrp = geometry.groups();

        scratch.ensure(groups, padded_len)?;
        for band in &mut self.bands {
            grow_zeroed(&mut band.sums, ngrp)?;
        }

        let Scratch {
            group_sums,
            group_exc,
            group_inh,
            padded,
        } = scratch;
        let exc = &mut group_exc[..groups];
        let inh = &mut group_inh[..groups];
        let sums = &mut group_sums[..groups];
        let padded = &mut padded[..padded_len];

        // === Group sums, one source row per task ===
        let mut clamps: u64 = activity
            .par_chunks(ngx * nel)
            .zip(exc.par_chunks_mut(ngx))
            .zip(inh.par_chunks_mut(ngx))
            .map(|((cells, exc), inh)| accumulate_cells(cells.iter().copied().enumerate(), nel, &options, exc, inh))
            .sum();
        for ((sum, e), i) in sums.iter_mut().zip(exc.iter()).zip(inh.iter()) {
            *sum = e - i;
        }

        // === Padded grid ===
        let boundary = self.config.boundary;
        let border = contribution(self.config.border, &options).saturating_mul(nel as i64);
        let (sgx, sgy) = (ngx as i64, self.source_shape.ngy as i64);
        let sums: &[i64] = sums;
        padded
            .par_chunks_mut(geometry.l1xn2 as usize)
            .enumerate()
            .for_each(|(py, row)| {
                for (px, slot) in row.iter_mut().enumerate() {
                    let (sx, sy) = geometry.source_coords(px, py);
                    *slot = match boundary_source(sx, sy, sgx, sgy, boundary) {
                        Some((x, y)) => sums[(y * sgx + x) as usize],
                        None if boundary == BoundaryKind::Noise => border,
                        None => 0,
                    };
                }
            });

        // === Band sums, bands and target rows in parallel ===
        let padded: &[i64] = padded;
        clamps += self
            .bands
            .par_iter_mut()
            .zip(geometry.bands.par_iter())
            .map(|(band, shape)| {
                band.sums[..ngrp]
                    .par_chunks_mut(ngx)
                    .enumerate()
                    .map(|(ly, row)| {
                        let mut clamps = 0;
                        for (x, slot) in row.iter_mut().enumerate() {
                            let base = geometry.base(x, ly) as isize;
                            let mut sum = 0i64;
                            for &offset in &shape.linear {
                                let c = accumulate(sum, padded[(base + offset) as usize], BAND_SUM_CEILING);
                                clamps += c.overflowed as u64;
                                sum = c.value;
                            }
                            *slot = sum;
                        }
                        clamps
                    })
                    .sum::<u64>()
            })
            .sum::<u64>();

        let first_row = geometry.params.first_row as usize;

        // === Own contributions, clamped like the sums they leave ===
        if self.self_layer {
            grow_zeroed(&mut self.own, self.cells)?;
            let start = first_row * ngx * nel;
            for (own, &a) in self.own[..self.cells].iter_mut().zip(&activity[start..]) {
                let c = clamp_to(contribution(a, &options), BAND_SUM_CEILING);
                clamps += c.overflowed as u64;
                *own = c.value;
            }
        }

        // === Split ring-0 sums ===
        if options.self_avoid {
            for k in 0..2 {
                grow_zeroed(&mut self.rnsums[k], ngrp)?;
            }
            grow_zeroed(&mut self.r0sum, ngrp)?;
            for g in 0..ngrp {
                let source_group = first_row * ngx + g;
                self.rnsums[0][g] = exc[source_group];
                self.rnsums[1][g] = inh[source_group];
                self.r0sum[g] = exc[source_group] - inh[source_group];
            }
        }

        Ok(clamps)
    }

    fn blend_history(&mut self) -> InhibResult<u64> {
        if !self.decay.enabled() {
            return Ok(0);
        }
        self.decay.ensure(self.bands.len(), self.geometry.groups())?;
        let mut clamps = 0;
        for (b, band) in self.bands.iter_mut().enumerate() {
            clamps += self.decay.blend(b, &mut band.sums, self.trial_cycles);
        }
        // band 0 now carries past own contributions; self-avoidance reads
        // the current ring-0 sums instead
        if self.self_layer && !self.config.options.self_avoid {
            self.decay.ensure_own(self.cells)?;
            clamps += self.decay.blend_own(&mut self.own[..self.cells], self.trial_cycles);
        }
        self.decay.finish_cycle();
        Ok(clamps)
    }

    /// Squared or positive-only inputs can never make a band sum negative
    fn check_signs(&self) -> InhibResult<()> {
        let options = &self.config.options;
        if !self.config.gssck || !(options.square_sums || options.positive_only) {
            return Ok(());
        }
        match self.bands.iter().position(|band| band.sums.iter().any(|&s| s < 0)) {
            Some(band) => Err(InhibitionError::SignCheck {
                block: self.id.index,
                band,
            }),
            None => Ok(()),
        }
    }

    // === Combined ===

    fn update_multipliers(&mut self) -> u64 {
        let mut clamps = 0;
        for (b, band) in self.bands.iter_mut().enumerate() {
            band.asbeta = match self.config.autoscale {
                Some(params) if !overridden(params.gpspov, b) => {
                    let scaled = scale_beta(band.beta, self.gbcm);
                    clamps += scaled.overflowed as u64;
                    scaled.value
                }
                _ => band.beta,
            };
        }
        clamps
    }

    fn combine(&mut self) -> OverflowCounters {
        let ngx = self.geometry.params.ngx as usize;
        let tnel = self.target_shape.nel as usize;
        let per_cell = self.flags.effective_per_cell;
        let self_layer = self.self_layer;
        let owns: &[i64] = &self.own;

        self.frame.resize(self.cells, Delivery::default());
        let combiner = Combiner {
            bands: &self.bands,
            norm: self.norm.as_ref(),
            rnsums: &self.rnsums,
            config: &self.config,
        };

        self.frame
            .par_chunks_mut(ngx * tnel)
            .enumerate()
            .map(|(ly, row)| {
                let mut counters = OverflowCounters::default();
                for x in 0..ngx {
                    let group = ly * ngx + x;
                    let cells = &mut row[x * tnel..(x + 1) * tnel];
                    if per_cell {
                        let first = group * tnel;
                        for (k, slot) in cells.iter_mut().enumerate() {
                            let own = self_layer.then(|| owns[first + k]);
                            let (delivery, c) = combiner.evaluate(group, own);
                            *slot = delivery;
                            counters += c;
                        }
                    } else {
                        let (delivery, c) = combiner.evaluate(group, None);
                        cells.fill(delivery);
                        counters += c;
                    }
                }
                counters
            })
            .reduce(OverflowCounters::default, |a, b| a + b)
    }

    /// Move `gbcm` towards the value that would hit the target mean
    fn update_autoscale(&mut self) {
        let params = match self.config.autoscale {
            Some(params) => params,
            None => return,
        };
        if self.frozen > 0 {
            self.frozen -= 1;
            return;
        }
        if self.frame.is_empty() {
            return;
        }

        let total: i64 = self.frame.iter().map(|d| (d.magnitude() as i64).abs()).sum();
        let mean = total / self.frame.len() as i64;
        if mean == 0 {
            return;
        }

        let (min, max) = (params.min as i64, params.max as i64);
        let gbcm = self.gbcm as i64;
        let desired = (gbcm.saturating_mul(params.target as i64) / mean).clamp(min, max);
        let step = (desired - gbcm).saturating_mul(params.rate as i64) >> S15;
        self.gbcm = (gbcm + step).clamp(min, max) as i32;

        tracing::debug!(
            "Block {}/{} autoscale: mean {} target {} gbcm {}",
            self.id.target.0,
            self.id.index,
            mean,
            params.target,
            self.gbcm
        );
    }

    fn advance_delay(&mut self) {
        let depth = self.config.ihdelay as usize;
        self.output.resize(self.cells, Delivery::default());
        if depth == 0 {
            self.output.copy_from_slice(&self.frame);
            return;
        }

        // a full line hands its oldest frame out and takes the outgoing
        // output buffer back for the new one
        if self.delay.len() >= depth {
            if let Some(mut due) = self.delay.pop_front() {
                std::mem::swap(&mut self.output, &mut due);
                due.clear();
                due.extend_from_slice(&self.frame);
                self.delay.push_back(due);
            }
            self.priming = false;
            return;
        }

        let mut next = self.spare.pop().unwrap_or_default();
        next.clear();
        next.extend_from_slice(&self.frame);
        self.delay.push_back(next);
        if self.priming {
            if let Some(first) = self.delay.front() {
                self.output.copy_from_slice(first);
            }
        } else {
            self.output.fill(Delivery::default());
        }
    }

    // === Overflow ===

    fn escalate(&mut self, stage: OverflowStage, counters: &OverflowCounters, overflow: &OverflowVector) -> InhibResult<()> {
        if self.config.gssck && counters.stage(stage) > 0 {
            self.record(counters, overflow);
            return Err(InhibitionError::Overflow {
                block: self.id.index,
                stage,
            });
        }
        Ok(())
    }

    fn record(&mut self, counters: &OverflowCounters, overflow: &OverflowVector) {
        let total = counters.total();
        if total == 0 {
            return;
        }
        self.overflows += *counters;
        if let Some(slot) = self.config.iovec {
            overflow.increment(slot, total);
        }
        tracing::warn!(
            "Block {}/{} clamped {} values (band sums {}, multipliers {}, totals {})",
            self.id.target.0,
            self.id.index,
            total,
            counters.band_sum,
            counters.asbeta,
            counters.combined
        );
    }

    // === Accessors ===

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn target(&self) -> LayerId {
        self.id.target
    }

    pub fn source(&self) -> LayerId {
        self.config.source
    }

    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    pub fn flags(&self) -> DerivedFlags {
        self.flags
    }

    pub fn geometry(&self) -> &RingGeometry {
        &self.geometry
    }

    pub fn norm(&self) -> Option<&NormalizationTable> {
        self.norm.as_ref()
    }

    pub fn bands(&self) -> &[InhibitionBand] {
        &self.bands
    }

    /// Ring-0 `(excitatory, inhibitory, net)` sums kept for self-avoidance
    pub fn ring_zero(&self) -> (&[i64], &[i64], &[i64]) {
        (&self.rnsums[0], &self.rnsums[1], &self.r0sum)
    }

    /// Values due for delivery this cycle
    pub fn output(&self) -> &[Delivery] {
        &self.output
    }

    /// Autoscale multiplier (S24)
    pub fn gbcm(&self) -> i32 {
        self.gbcm
    }

    /// Clamps counted since construction
    pub fn overflows(&self) -> OverflowCounters {
        self.overflows
    }

    pub fn phase(&self) -> BlockPhase {
        self.phase
    }

    pub fn trial_cycles(&self) -> u64 {
        self.trial_cycles
    }

    pub fn cells(&self) -> usize {
        self.cells
    }
}
