//! # Layers - Handles into the Host Network
//!
//! The engine never owns cell state. It only needs each layer's group
//! grid and how many cells sit in a group. Blocks refer to their source
//! layer by [`LayerId`], a plain index into the [`LayerRegistry`], so a
//! layer's block list and a block's source never form an ownership cycle.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Handle to a layer in the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u32);

/// Handle to an inhibition block: owning layer plus position in its list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    pub target: LayerId,
    pub index: u32,
}

/// Rectangular group layout of a layer
///
/// Deserialized shapes go through [`LayerShape::new`], so a JSON network
/// with an empty dimension fails to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ShapeDef")]
pub struct LayerShape {
    /// Groups along x
    pub ngx: u16,

    /// Groups along y
    pub ngy: u16,

    /// Cells per group
    pub nel: u16,
}

impl LayerShape {
    pub fn new(ngx: u16, ngy: u16, nel: u16) -> Result<Self, ConfigurationError> {
        let shape = Self { ngx, ngy, nel };
        shape.validate()?;
        Ok(shape)
    }

    /// Reject shapes with an empty dimension
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ngx == 0 {
            return Err(ConfigurationError::ZeroDimension("ngx"));
        }
        if self.ngy == 0 {
            return Err(ConfigurationError::ZeroDimension("ngy"));
        }
        if self.nel == 0 {
            return Err(ConfigurationError::ZeroDimension("nel"));
        }
        Ok(())
    }

    /// Number of groups
    pub fn groups(&self) -> usize {
        self.ngx as usize * self.ngy as usize
    }

    /// Number of cells, ordered group-major (row, then column, then cell)
    pub fn cells(&self) -> usize {
        self.groups() * self.nel as usize
    }
}

#[derive(Deserialize)]
struct ShapeDef {
    ngx: u16,
    ngy: u16,
    nel: u16,
}

impl TryFrom<ShapeDef> for LayerShape {
    type Error = ConfigurationError;

    fn try_from(def: ShapeDef) -> Result<Self, Self::Error> {
        LayerShape::new(def.ngx, def.ngy, def.nel)
    }
}

/// Layer shapes known to the engine
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerRegistry {
    layers: Vec<LayerShape>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer, returning its handle
    pub fn register(&mut self, shape: LayerShape) -> LayerId {
        self.layers.push(shape);
        LayerId(self.layers.len() as u32 - 1)
    }

    pub fn shape(&self, id: LayerId) -> Result<LayerShape, ConfigurationError> {
        self.layers
            .get(id.0 as usize)
            .copied()
            .ok_or(ConfigurationError::UnknownLayer(id))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        (0..self.layers.len() as u32).map(LayerId)
    }
}
