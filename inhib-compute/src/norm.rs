//! # Normalization Table
//!
//! Used by the `Norm` boundary condition. Out-of-bounds groups contribute
//! nothing, and each band sum is divided by the area that actually lies
//! inside the layer instead of the band's nominal area.
//!
//! The table keeps the `{x, y}` offsets of every band and, per target group
//! and band, the in-bounds area in cells.

use inhib_core::error::ConfigurationError;

use crate::geometry::RingGeometry;

/// One group offset, immutable once built
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XYNormDef {
    pub x: i16,
    pub y: i16,
}

/// Boundary-corrected band areas
#[derive(Clone, Debug)]
pub struct NormalizationTable {
    /// Offsets of all bands, concatenated
    defs: Vec<XYNormDef>,

    /// `defs[band_start[b]..band_start[b + 1]]` belong to band `b`
    band_start: Vec<usize>,

    /// In-bounds area in cells, `[group * nib + band]`
    areas: Vec<u32>,

    nib: usize,
}

impl NormalizationTable {
    pub fn build(geometry: &RingGeometry) -> Result<Self, ConfigurationError> {
        let p = geometry.params;
        let nib = geometry.nib();

        let mut defs = Vec::new();
        let mut band_start = Vec::with_capacity(nib + 1);
        for band in &geometry.bands {
            band_start.push(defs.len());
            for &(dx, dy) in &band.offsets {
                let x = i16::try_from(dx).map_err(|_| offset_range("dx", dx))?;
                let y = i16::try_from(dy).map_err(|_| offset_range("dy", dy))?;
                defs.push(XYNormDef { x, y });
            }
        }
        band_start.push(defs.len());

        let ngx = p.ngx as i32;
        let ngy = p.ngy as i32;
        let nel = p.nel as u32;
        let mut areas = Vec::with_capacity(geometry.nbsums as usize);
        for ly in 0..p.mgy as i32 {
            let y = p.first_row as i32 + ly;
            for x in 0..ngx {
                for b in 0..nib {
                    let inside = defs[band_start[b]..band_start[b + 1]]
                        .iter()
                        .filter(|d| {
                            let sx = x + d.x as i32;
                            let sy = y + d.y as i32;
                            (0..ngx).contains(&sx) && (0..ngy).contains(&sy)
                        })
                        .count() as u32;
                    areas.push(inside * nel);
                }
            }
        }

        Ok(Self {
            defs,
            band_start,
            areas,
            nib,
        })
    }

    /// Offsets of band `band`
    pub fn band_defs(&self, band: usize) -> &[XYNormDef] {
        &self.defs[self.band_start[band]..self.band_start[band + 1]]
    }

    /// In-bounds area in cells, never zero
    pub fn area(&self, group: usize, band: usize) -> u32 {
        self.areas[group * self.nib + band].max(1)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

fn offset_range(name: &'static str, value: i32) -> ConfigurationError {
    ConfigurationError::InvalidParameter {
        name,
        reason: format!("offset {} does not fit the 16-bit normalization table", value),
    }
}
