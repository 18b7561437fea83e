//! # Ring Geometry
//!
//! Partitions the surround of a target group into bands of rings.
//!
//! ## Layout
//!
//! 1. Ring `r` holds the group offsets at distance `r` from the target:
//!    Chebyshev distance for square surrounds, `(r-1)^2 < dx^2+dy^2 <= r^2`
//!    for round ones
//! 2. Band 0 is ring 0, the target's own group
//! 3. Band `b >= 1` covers rings `(b-1)*ngb + 1 ..= b*ngb`
//!
//! Source group sums are copied into a grid padded by `l1n1 = nr - 1`
//! groups on every side. Each band then stores linear offsets into that
//! padded grid, so a band sum is a plain gather around `base(x, y)`.
//!
//! ## Overflow
//!
//! Every factor fits in 16 bits but cross products do not all fit in 32.
//! All products are computed with checked `u32` arithmetic before any
//! table is allocated.

use inhib_core::error::ConfigurationError;
use inhib_core::fixed::isqrt_ceil;

/// Inputs to [`RingGeometry::build`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryParams {
    /// Source groups along x
    pub ngx: u16,
    /// Source groups along y
    pub ngy: u16,
    /// Source cells per group
    pub nel: u16,
    /// Ring radius, counting the center ring
    pub nr: u16,
    /// Rings per band beyond band 0
    pub ngb: u16,
    /// Number of bands
    pub nib: u16,
    /// First target row of the partition
    pub first_row: u16,
    /// Target rows in the partition (`mgy`)
    pub mgy: u16,
    /// Round surround (IBOPRS)
    pub round: bool,
}

/// Offsets belonging to one band
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandGeometry {
    /// First and last ring of the band
    pub rings: (u32, u32),

    /// Group offsets `(dx, dy)`
    pub offsets: Vec<(i32, i32)>,

    /// Offsets into the padded grid, `dy * l1xn2 + dx`
    pub linear: Vec<isize>,
}

impl BandGeometry {
    /// Nominal number of groups in the band
    pub fn groups(&self) -> u32 {
        self.offsets.len() as u32
    }
}

/// Disk-shaped surround used when IBOPRS is set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRegion {
    /// Linear offsets in the padded grid, sorted by ring then offset
    pub offsets: Vec<isize>,

    /// Ring of each entry
    pub rings: Vec<u32>,
}

impl RoundRegion {
    /// Table size (`nrro`)
    pub fn nrro(&self) -> usize {
        self.offsets.len()
    }
}

/// Band partition and derived constants for one block
#[derive(Clone, Debug)]
pub struct RingGeometry {
    pub params: GeometryParams,

    /// Largest ring index, `nr - 1`
    pub l1n1: u32,

    /// Padded width, `ngx + 2 * l1n1`
    pub l1xn2: u32,

    /// Padded height, `mgy + 2 * l1n1`
    pub l1yn2: u32,

    /// Padded grid size, `l1xn2 * l1yn2`
    pub l1n2: u32,

    /// Target groups in the partition, `ngx * mgy`
    pub ngrp: u32,

    /// Band sum slots, `ngrp * nib`
    pub nbsums: u32,

    /// Source cells, `ngx * ngy * nel`
    pub ncells: u32,

    /// Offsets in the bounding square, `(2 * l1n1 + 1)^2`
    pub lsq: u32,

    pub bands: Vec<BandGeometry>,

    pub round: Option<RoundRegion>,
}

fn checked_mul(product: &'static str, lhs: u32, rhs: u32) -> Result<u32, ConfigurationError> {
    lhs.checked_mul(rhs).ok_or(ConfigurationError::GeometryOverflow {
        product,
        lhs: lhs as u64,
        rhs: rhs as u64,
    })
}

fn checked_add(product: &'static str, lhs: u32, rhs: u32) -> Result<u32, ConfigurationError> {
    lhs.checked_add(rhs).ok_or(ConfigurationError::GeometryOverflow {
        product,
        lhs: lhs as u64,
        rhs: rhs as u64,
    })
}

/// Ring index of an offset
pub fn ring_of(dx: i32, dy: i32, round: bool) -> u32 {
    if round {
        let d2 = (dx as i64 * dx as i64 + dy as i64 * dy as i64) as u64;
        isqrt_ceil(d2) as u32
    } else {
        dx.unsigned_abs().max(dy.unsigned_abs())
    }
}

/// Band holding ring `ring` when bands are `ngb` rings wide
pub fn band_of(ring: u32, ngb: u32) -> usize {
    if ring == 0 {
        0
    } else {
        ((ring - 1) / ngb + 1) as usize
    }
}

impl RingGeometry {
    /// Validate the parameters and build the band tables
    pub fn build(params: GeometryParams) -> Result<Self, ConfigurationError> {
        if params.ngx == 0 {
            return Err(ConfigurationError::ZeroDimension("ngx"));
        }
        if params.ngy == 0 {
            return Err(ConfigurationError::ZeroDimension("ngy"));
        }
        if params.nel == 0 {
            return Err(ConfigurationError::ZeroDimension("nel"));
        }
        if params.mgy == 0 {
            return Err(ConfigurationError::ZeroDimension("mgy"));
        }
        if params.nib == 0 {
            return Err(ConfigurationError::ZeroDimension("nib"));
        }
        if params.ngb == 0 {
            return Err(ConfigurationError::ZeroDimension("ngb"));
        }
        if params.nr == 0 {
            return Err(if params.round {
                ConfigurationError::RoundWithoutRadius
            } else {
                ConfigurationError::ZeroDimension("nr")
            });
        }

        let expected = 1 + (params.nib as u32 - 1) * params.ngb as u32;
        if params.nr as u32 != expected {
            return Err(ConfigurationError::RingMismatch {
                nr: params.nr,
                expected,
            });
        }

        // === Derived products, all checked ===
        let l1n1 = params.nr as u32 - 1;
        let pad = checked_mul("2*l1n1", 2, l1n1)?;
        let l1xn2 = checked_add("l1xn2", params.ngx as u32, pad)?;
        let l1yn2 = checked_add("l1yn2", params.mgy as u32, pad)?;
        let l1n2 = checked_mul("l1n2", l1xn2, l1yn2)?;
        let ngrp = checked_mul("ngrp", params.ngx as u32, params.mgy as u32)?;
        let nbsums = checked_mul("nbsums", ngrp, params.nib as u32)?;
        let source_groups = checked_mul("ngx*ngy", params.ngx as u32, params.ngy as u32)?;
        let ncells = checked_mul("ncells", source_groups, params.nel as u32)?;
        let side = checked_add("2*l1n1+1", pad, 1)?;
        let lsq = checked_mul("lsq", side, side)?;

        // === Band offsets ===
        let ngb = params.ngb as u32;
        let mut bands: Vec<BandGeometry> = (0..params.nib as u32)
            .map(|b| {
                let rings = if b == 0 {
                    (0, 0)
                } else {
                    ((b - 1) * ngb + 1, b * ngb)
                };
                BandGeometry {
                    rings,
                    offsets: Vec::new(),
                    linear: Vec::new(),
                }
            })
            .collect();

        let reach = l1n1 as i32;
        let mut disk: Vec<(u32, isize)> = Vec::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let ring = ring_of(dx, dy, params.round);
                if ring > l1n1 {
                    continue;
                }
                let linear = dy as isize * l1xn2 as isize + dx as isize;
                let band = &mut bands[band_of(ring, ngb)];
                band.offsets.push((dx, dy));
                band.linear.push(linear);
                if params.round {
                    disk.push((ring, linear));
                }
            }
        }

        let round = if params.round {
            disk.sort_unstable();
            Some(RoundRegion {
                rings: disk.iter().map(|&(ring, _)| ring).collect(),
                offsets: disk.into_iter().map(|(_, linear)| linear).collect(),
            })
        } else {
            None
        };

        Ok(Self {
            params,
            l1n1,
            l1xn2,
            l1yn2,
            l1n2,
            ngrp,
            nbsums,
            ncells,
            lsq,
            bands,
            round,
        })
    }

    /// Index in the padded grid of target group `(x, ly)` of the partition
    pub fn base(&self, x: usize, ly: usize) -> usize {
        (ly + self.l1n1 as usize) * self.l1xn2 as usize + x + self.l1n1 as usize
    }

    /// Source layer coordinates of a padded grid cell (may be out of bounds)
    pub fn source_coords(&self, px: usize, py: usize) -> (i64, i64) {
        let sx = px as i64 - self.l1n1 as i64;
        let sy = self.params.first_row as i64 + py as i64 - self.l1n1 as i64;
        (sx, sy)
    }

    /// Number of bands
    pub fn nib(&self) -> usize {
        self.bands.len()
    }

    /// Target groups in the partition
    pub fn groups(&self) -> usize {
        self.ngrp as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ngx: u16, ngy: u16, nib: u16, ngb: u16, round: bool) -> GeometryParams {
        GeometryParams {
            ngx,
            ngy,
            nel: 1,
            nr: 1 + (nib - 1) * ngb,
            ngb,
            nib,
            first_row: 0,
            mgy: ngy,
            round,
        }
    }

    /// Lattice points with dx^2 + dy^2 <= r^2, counted directly
    fn disk_count(r: i64) -> usize {
        let mut count = 0;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn test_square_bands() {
        let geometry = RingGeometry::build(params(10, 8, 3, 2, false)).unwrap();
        assert_eq!(geometry.l1n1, 4);
        assert_eq!(geometry.l1xn2, 18);
        assert_eq!(geometry.l1yn2, 16);
        assert_eq!(geometry.l1n2, 18 * 16);
        assert_eq!(geometry.nbsums, 80 * 3);
        assert_eq!(geometry.bands[0].groups(), 1);
        // rings 1..=2 of a square: 5x5 - 1
        assert_eq!(geometry.bands[1].groups(), 24);
        assert_eq!(geometry.bands[1].rings, (1, 2));
        // rings 3..=4: 9x9 - 5x5
        assert_eq!(geometry.bands[2].groups(), 56);
        let total: u32 = geometry.bands.iter().map(|b| b.groups()).sum();
        assert_eq!(total, geometry.lsq);
        assert!(geometry.round.is_none());
    }

    #[test]
    fn test_linear_offsets_match_padded_layout() {
        let geometry = RingGeometry::build(params(5, 5, 2, 1, false)).unwrap();
        for (&(dx, dy), &linear) in geometry.bands[1].offsets.iter().zip(&geometry.bands[1].linear) {
            assert_eq!(linear, dy as isize * 7 + dx as isize);
        }
        // base of the corner group sits one pad in from the padded corner
        assert_eq!(geometry.base(0, 0), 7 + 1);
        assert_eq!(geometry.source_coords(0, 0), (-1, -1));
    }

    #[test]
    fn test_round_table_sizes() {
        let one = RingGeometry::build(params(8, 8, 1, 1, true)).unwrap();
        assert_eq!(one.round.as_ref().unwrap().nrro(), 1);

        let three = RingGeometry::build(params(8, 8, 3, 1, true)).unwrap();
        assert_eq!(three.round.as_ref().unwrap().nrro(), 13);
        assert_eq!(three.round.as_ref().unwrap().nrro(), disk_count(2));

        let five = RingGeometry::build(params(16, 16, 3, 2, true)).unwrap();
        assert_eq!(five.round.as_ref().unwrap().nrro(), disk_count(4));
    }

    #[test]
    fn test_round_table_symmetric_and_covers_square() {
        for nib in 1..6 {
            let geometry = RingGeometry::build(params(20, 20, nib, 1, true)).unwrap();
            let region = geometry.round.as_ref().unwrap();
            for offset in &region.offsets {
                assert!(region.offsets.contains(&-offset));
            }
            // never smaller than the inscribed square of the same radius
            let r = geometry.l1n1 as f64;
            let half = (r / std::f64::consts::SQRT_2).floor() as usize;
            assert!(region.nrro() >= (2 * half + 1) * (2 * half + 1));
            // rings are sorted
            assert!(region.rings.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_round_ties_included() {
        // (3, 4) lies exactly on radius 5
        assert_eq!(ring_of(3, 4, true), 5);
        assert_eq!(ring_of(3, 4, false), 4);
        assert_eq!(ring_of(1, 1, true), 2);
    }

    #[test]
    fn test_ring_mismatch() {
        let mut p = params(8, 8, 3, 2, false);
        p.nr = 4;
        assert_eq!(
            RingGeometry::build(p).unwrap_err(),
            ConfigurationError::RingMismatch { nr: 4, expected: 5 }
        );
    }

    #[test]
    fn test_round_without_radius() {
        let mut p = params(8, 8, 1, 1, true);
        p.nr = 0;
        assert_eq!(RingGeometry::build(p).unwrap_err(), ConfigurationError::RoundWithoutRadius);
    }

    #[test]
    fn test_empty_source_layer_rejected() {
        let mut p = params(4, 4, 2, 1, false);
        p.nel = 0;
        assert_eq!(RingGeometry::build(p).unwrap_err(), ConfigurationError::ZeroDimension("nel"));

        let mut p = params(4, 4, 2, 1, false);
        p.ngy = 0;
        assert_eq!(RingGeometry::build(p).unwrap_err(), ConfigurationError::ZeroDimension("ngy"));
    }

    #[test]
    fn test_products_never_truncate() {
        let cases = [
            (1u16, 1u16, 1u16, 1u16),
            (65_535, 1, 2, 1),
            (1, 65_535, 3, 1),
            (4_000, 4_000, 4, 1),
            (65_535, 16_000, 2, 1),
            (300, 200, 5, 3),
        ];
        for (ngx, ngy, nib, ngb) in cases {
            let p = params(ngx, ngy, nib, ngb, false);
            let l1n1 = p.nr as u64 - 1;
            let l1xn2 = ngx as u64 + 2 * l1n1;
            let l1yn2 = ngy as u64 + 2 * l1n1;
            let wide = [
                l1xn2 * l1yn2,
                ngx as u64 * ngy as u64 * nib as u64,
                (2 * l1n1 + 1) * (2 * l1n1 + 1),
            ];
            let fits = wide.iter().all(|&v| v <= u32::MAX as u64);
            match RingGeometry::build(p) {
                Ok(g) => {
                    assert!(fits);
                    assert_eq!(g.l1n2 as u64, wide[0]);
                    assert_eq!(g.nbsums as u64, wide[1]);
                    assert_eq!(g.lsq as u64, wide[2]);
                }
                Err(ConfigurationError::GeometryOverflow { .. }) => assert!(!fits),
                Err(other) => panic!("unexpected {other}"),
            }
        }
    }

    #[test]
    fn test_oversized_products_rejected() {
        let err = RingGeometry::build(params(65_535, 65_535, 3, 1, false)).unwrap_err();
        assert!(matches!(err, ConfigurationError::GeometryOverflow { product: "l1n2", .. }));

        let err = RingGeometry::build(params(65_535, 32_768, 3, 1, false)).unwrap_err();
        assert!(matches!(err, ConfigurationError::GeometryOverflow { product: "nbsums", .. }));
    }
}
