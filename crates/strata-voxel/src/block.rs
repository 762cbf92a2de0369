//! Block registry: maps compact [`BlockId`] values to [`BlockDef`] metadata.
//!
//! The registry is built once during startup. Air is always ID 0 so that
//! zero-initialized block arrays represent empty space.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strata_math::Side;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Compact identifier stored in every cell of a chunk's block array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: BlockId = BlockId(0);
}

/// Geometric shape of a block, used to decide which faces fully cover the cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockShape {
    /// Full cube; every side is covered.
    Cube,
    /// Lower half slab; only the bottom side is covered.
    BottomSlab,
    /// Thin crossed planes (plants, lanterns); no side is covered.
    Cross,
}

impl BlockShape {
    /// Returns `true` if the shape fully covers `side`.
    pub fn is_full_side(self, side: Side) -> bool {
        match self {
            BlockShape::Cube => true,
            BlockShape::BottomSlab => side == Side::Bottom,
            BlockShape::Cross => false,
        }
    }
}

/// Full descriptor for a block type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDef {
    /// Unique name, e.g. "stone".
    pub name: String,
    /// Light passes through the block.
    pub translucent: bool,
    /// The block is a liquid; sunlight loses strength inside it.
    pub liquid: bool,
    /// Light emission level (0 = none, 15 = max).
    pub luminance: u8,
    /// Shape used for face coverage.
    pub shape: BlockShape,
}

impl BlockDef {
    /// Opaque full cube with no emission.
    pub fn solid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            translucent: false,
            liquid: false,
            luminance: 0,
            shape: BlockShape::Cube,
        }
    }
}

/// Errors that can occur during block registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A block with the same name has already been registered.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
    /// All 65 536 ids have been consumed.
    #[error("block registry is full (max 65536 blocks)")]
    RegistryFull,
    /// Luminance must fit in a light level.
    #[error("block {name} has luminance {luminance} above 15")]
    LuminanceOutOfRange {
        /// Block name.
        name: String,
        /// Rejected luminance.
        luminance: u8,
    },
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`BlockId`] → [`BlockDef`] with O(1) lookup by index and by name.
#[derive(Debug)]
pub struct BlockRegistry {
    /// Dense array where `index == BlockId.0`.
    blocks: Vec<BlockDef>,
    name_to_id: FxHashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a registry containing only air.
    pub fn new() -> Self {
        let air = BlockDef {
            name: "air".to_string(),
            translucent: true,
            liquid: false,
            luminance: 0,
            shape: BlockShape::Cross,
        };

        let mut name_to_id = FxHashMap::default();
        name_to_id.insert("air".to_string(), BlockId::AIR);

        Self {
            blocks: vec![air],
            name_to_id,
        }
    }

    /// Creates a registry with the core terrain blocks used by the built-in generators:
    /// stone, dirt, grass, lava, water, glass and lantern.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults = [
            BlockDef::solid("stone"),
            BlockDef::solid("dirt"),
            BlockDef::solid("grass"),
            BlockDef {
                name: "lava".to_string(),
                translucent: true,
                liquid: true,
                luminance: 15,
                shape: BlockShape::Cube,
            },
            BlockDef {
                name: "water".to_string(),
                translucent: true,
                liquid: true,
                luminance: 0,
                shape: BlockShape::Cube,
            },
            BlockDef {
                name: "glass".to_string(),
                translucent: true,
                liquid: false,
                luminance: 0,
                shape: BlockShape::Cube,
            },
            BlockDef {
                name: "lantern".to_string(),
                translucent: true,
                liquid: false,
                luminance: 14,
                shape: BlockShape::Cross,
            },
        ];
        for def in defaults {
            // Names are distinct and the registry is nearly empty, so this cannot fail.
            let _ = registry.register(def);
        }
        registry
    }

    /// Registers a new block and returns its assigned ID.
    ///
    /// IDs are assigned sequentially starting from 1 (0 is air).
    pub fn register(&mut self, def: BlockDef) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if def.luminance > 15 {
            return Err(RegistryError::LuminanceOutOfRange {
                name: def.name,
                luminance: def.luminance,
            });
        }
        if self.blocks.len() > u16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockId(self.blocks.len() as u16);
        self.name_to_id.insert(def.name.clone(), id);
        self.blocks.push(def);
        Ok(id)
    }

    /// Returns the definition for `id`. Unknown ids resolve to air, so corrupt
    /// or foreign block data never aborts lighting or generation.
    pub fn get(&self, id: BlockId) -> &BlockDef {
        self.blocks.get(id.0 as usize).unwrap_or(&self.blocks[0])
    }

    /// Returns the ID for a named block, or `None` if not found.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Returns the ID for a named block, falling back to air.
    pub fn id_or_air(&self, name: &str) -> BlockId {
        self.lookup_by_name(name).unwrap_or(BlockId::AIR)
    }

    /// Total number of registered blocks (including air).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.len() <= 1
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
