//! Chunk generators.
//!
//! First-pass generators fill one chunk from its position alone. Second-pass
//! generators run later over a locked view of the chunk's neighborhood and
//! may write into neighboring chunks.

use std::sync::Arc;

use glam::IVec3;
use strata_config::{GeneratorKind, WorldConfig};
use strata_voxel::{
    BlockId, Chunk, ChunkContext, ChunkData, ChunkError, ChunkType, MAX_LIGHT, WorldView,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("chunk type {chunk_type:?} is not stackable, cannot generate chunk {pos}")]
    UnsupportedChunkType { chunk_type: ChunkType, pos: IVec3 },
    #[error("generator {generator} failed: {source}")]
    Chunk {
        generator: &'static str,
        #[source]
        source: ChunkError,
    },
}

/// Fills a fresh chunk. `data` is blank (all air, no light).
pub trait FirstPassGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, pos: IVec3, data: &mut ChunkData) -> Result<(), ChunkError>;
}

/// Decorates a chunk across its neighborhood. The view's origin chunk is the
/// chunk being decorated.
pub trait SecondPassGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn second_pass(&self, pos: IVec3, view: &mut WorldView<'_>);
}

pub struct ChunkGeneratorManager {
    chunk_type: ChunkType,
    context: Arc<ChunkContext>,
    first_pass: Vec<Box<dyn FirstPassGenerator>>,
    second_pass: Vec<Box<dyn SecondPassGenerator>>,
}

impl ChunkGeneratorManager {
    pub fn new(chunk_type: ChunkType, context: Arc<ChunkContext>) -> Self {
        Self {
            chunk_type,
            context,
            first_pass: Vec::new(),
            second_pass: Vec::new(),
        }
    }

    /// Builds the generator chain selected by the world configuration.
    pub fn from_config(config: &WorldConfig, context: Arc<ChunkContext>) -> Self {
        let chunk_type = ChunkType::from(config.chunk_type);
        let mut manager = Self::new(chunk_type, Arc::clone(&context));
        match config.generator {
            GeneratorKind::Flat => {
                manager.add_first_pass(FlatGenerator::new(&context, config.ground_level))
            }
            GeneratorKind::Stackable => {
                manager.add_first_pass(StackableTestGenerator::new(&context))
            }
        }
        if config.lanterns {
            manager.add_second_pass(LanternDecorator::new(&context));
        }
        manager
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn context(&self) -> &Arc<ChunkContext> {
        &self.context
    }

    pub fn add_first_pass(&mut self, generator: impl FirstPassGenerator + 'static) {
        debug!(generator = generator.name(), "first pass generator added");
        self.first_pass.push(Box::new(generator));
    }

    pub fn add_second_pass(&mut self, generator: impl SecondPassGenerator + 'static) {
        debug!(generator = generator.name(), "second pass generator added");
        self.second_pass.push(Box::new(generator));
    }

    /// Creates the chunk at `pos` and runs every first-pass generator on it.
    pub fn generate_chunk(&self, pos: IVec3) -> Result<Chunk, GenerateError> {
        if !self.chunk_type.is_stackable() && pos.y != 0 {
            return Err(GenerateError::UnsupportedChunkType {
                chunk_type: self.chunk_type,
                pos,
            });
        }
        let chunk = Chunk::new(pos, self.chunk_type, Arc::clone(&self.context));
        {
            let mut data = chunk.lock();
            for generator in &self.first_pass {
                generator
                    .generate(pos, &mut data)
                    .map_err(|source| GenerateError::Chunk {
                        generator: generator.name(),
                        source,
                    })?;
            }
        }
        Ok(chunk)
    }

    /// Runs every second-pass generator over the locked neighborhood of `pos`.
    pub fn second_pass(&self, pos: IVec3, view: &mut WorldView<'_>) {
        for generator in &self.second_pass {
            generator.second_pass(pos, view);
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in generators
// ---------------------------------------------------------------------------

/// Stone, three layers of dirt, then grass at `ground_level`.
pub struct FlatGenerator {
    ground_level: i32,
    stone: BlockId,
    dirt: BlockId,
    grass: BlockId,
}

impl FlatGenerator {
    pub fn new(context: &ChunkContext, ground_level: i32) -> Self {
        Self {
            ground_level,
            stone: context.blocks.id_or_air("stone"),
            dirt: context.blocks.id_or_air("dirt"),
            grass: context.blocks.id_or_air("grass"),
        }
    }

    fn block_at(&self, world_y: i32) -> BlockId {
        if world_y < self.ground_level - 3 {
            self.stone
        } else if world_y < self.ground_level {
            self.dirt
        } else if world_y == self.ground_level {
            self.grass
        } else {
            BlockId::AIR
        }
    }
}

impl FirstPassGenerator for FlatGenerator {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn generate(&self, pos: IVec3, data: &mut ChunkData) -> Result<(), ChunkError> {
        let size = data.size();
        let base_y = pos.y * size.y as i32;
        for y in 0..size.y as i32 {
            let block = self.block_at(base_y + y);
            if block == BlockId::AIR {
                continue;
            }
            for z in 0..size.z as i32 {
                for x in 0..size.x as i32 {
                    data.set_block(IVec3::new(x, y, z), block);
                }
            }
        }
        Ok(())
    }
}

/// Horizontal bands by chunk height: air at and above chunk Y 0, then dirt,
/// stone, and lava below chunk Y -15. Every cell starts fully lit.
pub struct StackableTestGenerator {
    dirt: BlockId,
    stone: BlockId,
    lava: BlockId,
}

impl StackableTestGenerator {
    pub fn new(context: &ChunkContext) -> Self {
        Self {
            dirt: context.blocks.id_or_air("dirt"),
            stone: context.blocks.id_or_air("stone"),
            lava: context.blocks.id_or_air("lava"),
        }
    }

    fn fill_for(&self, chunk_y: i32) -> BlockId {
        if chunk_y >= 0 {
            BlockId::AIR
        } else if chunk_y > -5 {
            self.dirt
        } else if chunk_y > -15 {
            self.stone
        } else {
            self.lava
        }
    }
}

impl FirstPassGenerator for StackableTestGenerator {
    fn name(&self) -> &'static str {
        "stackable-test"
    }

    fn generate(&self, pos: IVec3, data: &mut ChunkData) -> Result<(), ChunkError> {
        let fill = self.fill_for(pos.y);
        let size = data.size();
        for y in 0..size.y as i32 {
            for z in 0..size.z as i32 {
                for x in 0..size.x as i32 {
                    data.set_block(IVec3::new(x, y, z), fill);
                }
            }
        }
        data.fill_light(MAX_LIGHT, MAX_LIGHT)
    }
}

/// Places a lantern on top of the chunk's (0, 0) column and another on the
/// diagonal neighbor's column across the -X/-Z corner.
pub struct LanternDecorator {
    lantern: BlockId,
}

impl LanternDecorator {
    pub fn new(context: &ChunkContext) -> Self {
        Self {
            lantern: context.blocks.id_or_air("lantern"),
        }
    }

    /// Places a lantern on the highest solid block of column `(x, z)` within
    /// the chunk's Y range.
    fn place_on_column(&self, view: &mut WorldView<'_>, x: i32, z: i32, height: i32) -> bool {
        let Some(top) = (0..height)
            .rev()
            .find(|&y| view.get_block(IVec3::new(x, y, z)) != BlockId::AIR)
        else {
            return false;
        };
        if top + 1 >= height {
            return false;
        }
        let pos = IVec3::new(x, top + 1, z);
        let placed = view.set_block_if(pos, self.lantern, BlockId::AIR);
        if placed {
            view.set_dirty_around(pos);
        }
        placed
    }
}

impl SecondPassGenerator for LanternDecorator {
    fn name(&self) -> &'static str {
        "lanterns"
    }

    fn second_pass(&self, pos: IVec3, view: &mut WorldView<'_>) {
        if self.lantern == BlockId::AIR {
            return;
        }
        let height = view.chunk_type().size().y;
        let own = self.place_on_column(view, 0, 0, height);
        let neighbor = self.place_on_column(view, -1, -1, height);
        debug!(chunk = %pos, own, neighbor, "lanterns placed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
