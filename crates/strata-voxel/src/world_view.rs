//! Lock-holding windows over several neighboring chunks.
//!
//! [`ViewChunks`] gathers the chunks of a region. [`ViewChunks::lock`] then
//! locks each of them in region iteration order (Y, then Z, then X), which is
//! one global order for every view, and returns a [`WorldView`] that releases
//! all locks when dropped.
//!
//! Block coordinates inside a view are local: the origin is block (0, 0, 0)
//! of the chunk at `offset` within the region.

use std::sync::Arc;

use glam::IVec3;
use strata_math::Region3i;
use thiserror::Error;

use crate::block::{BlockDef, BlockId};
use crate::chunk::{Chunk, ChunkData, ChunkError, ChunkGuard};
use crate::chunk_type::ChunkType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldViewError {
    #[error("view region is empty")]
    EmptyRegion,
    #[error("view region holds {expected} chunks, got {actual}")]
    ChunkCount { expected: usize, actual: usize },
    #[error("chunk {actual} given where {expected} belongs")]
    PositionMismatch { expected: IVec3, actual: IVec3 },
}

/// The chunks of one view region, in region iteration order.
#[derive(Clone, Debug)]
pub struct ViewChunks {
    chunks: Vec<Arc<Chunk>>,
    region: Region3i,
    offset: IVec3,
    chunk_type: ChunkType,
}

impl ViewChunks {
    pub fn new(
        chunks: Vec<Arc<Chunk>>,
        region: Region3i,
        offset: IVec3,
        chunk_type: ChunkType,
    ) -> Result<Self, WorldViewError> {
        if region.is_empty() {
            return Err(WorldViewError::EmptyRegion);
        }
        let expected = region.iter().count();
        if chunks.len() != expected {
            return Err(WorldViewError::ChunkCount {
                expected,
                actual: chunks.len(),
            });
        }
        for (pos, chunk) in region.iter().zip(&chunks) {
            if chunk.pos() != pos {
                return Err(WorldViewError::PositionMismatch {
                    expected: pos,
                    actual: chunk.pos(),
                });
            }
        }
        Ok(Self {
            chunks,
            region,
            offset: offset * IVec3::new(1, chunk_type.f_stackable(), 1),
            chunk_type,
        })
    }

    /// Gathers `region` through `lookup`; `None` if any chunk is missing.
    pub fn collect<F>(
        region: Region3i,
        offset: IVec3,
        chunk_type: ChunkType,
        lookup: F,
    ) -> Option<Self>
    where
        F: Fn(IVec3) -> Option<Arc<Chunk>>,
    {
        let chunks = region.iter().map(&lookup).collect::<Option<Vec<_>>>()?;
        Self::new(chunks, region, offset, chunk_type).ok()
    }

    /// The 3x3(x3) neighborhood of `pos`, with the local origin in `pos` itself.
    pub fn local<F>(pos: IVec3, chunk_type: ChunkType, lookup: F) -> Option<Self>
    where
        F: Fn(IVec3) -> Option<Arc<Chunk>>,
    {
        let region = Region3i::from_center_extents(pos, chunk_type.chunk_extents(1));
        let offset = IVec3::new(1, chunk_type.f_stackable(), 1);
        Self::collect(region, offset, chunk_type, lookup)
    }

    /// The neighborhood of `pos`; local coordinates are world coordinates.
    pub fn around_chunk<F>(pos: IVec3, chunk_type: ChunkType, lookup: F) -> Option<Self>
    where
        F: Fn(IVec3) -> Option<Arc<Chunk>>,
    {
        let region = Region3i::from_center_extents(pos, chunk_type.chunk_extents(1));
        Self::collect(region, -region.min(), chunk_type, lookup)
    }

    /// Chunks covering every block within `extent` of a world block;
    /// local coordinates are world coordinates.
    pub fn around_block<F>(
        block: IVec3,
        extent: i32,
        chunk_type: ChunkType,
        lookup: F,
    ) -> Option<Self>
    where
        F: Fn(IVec3) -> Option<Arc<Chunk>>,
    {
        let region = chunk_type.chunk_region_around_block(block, extent);
        Self::collect(region, -region.min(), chunk_type, lookup)
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn region(&self) -> Region3i {
        self.region
    }

    /// Locks every chunk in region iteration order.
    pub fn lock(&self) -> WorldView<'_> {
        let guards = self.chunks.iter().map(|chunk| chunk.lock()).collect();
        let size = self.chunk_type.size();
        let stacked = IVec3::new(size.x, size.y * self.chunk_type.f_stackable(), size.z);
        let block_min = -self.offset * stacked;
        WorldView {
            chunks: &self.chunks,
            guards,
            chunk_region: self.region,
            block_region: Region3i::from_min_and_size(block_min, self.region.size() * size),
            offset: self.offset,
            chunk_type: self.chunk_type,
        }
    }
}

/// A locked, bounded read/write window over several chunks.
///
/// Reads outside the view return 0 (air, no light); writes outside are
/// ignored and return `false`.
pub struct WorldView<'a> {
    chunks: &'a [Arc<Chunk>],
    guards: Vec<ChunkGuard<'a>>,
    chunk_region: Region3i,
    block_region: Region3i,
    offset: IVec3,
    chunk_type: ChunkType,
}

impl<'a> WorldView<'a> {
    pub fn chunk_region(&self) -> Region3i {
        self.chunk_region
    }

    /// Local block coordinates covered by the view.
    pub fn block_region(&self) -> Region3i {
        self.block_region
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn is_in_bounds(&self, pos: IVec3) -> bool {
        self.block_region.encompasses(pos)
    }

    /// `false` once any chunk of the view has been disposed.
    pub fn is_valid_view(&self) -> bool {
        self.chunks.iter().all(|chunk| !chunk.is_disposed())
    }

    fn chunk_index(&self, local_chunk: IVec3) -> Option<usize> {
        let p = local_chunk + self.offset;
        let size = self.chunk_region.size();
        if p.cmplt(IVec3::ZERO).any() || p.cmpge(size).any() {
            return None;
        }
        Some(((p.y * size.z + p.z) * size.x + p.x) as usize)
    }

    fn locate(&self, pos: IVec3) -> Option<(usize, IVec3)> {
        if !self.is_in_bounds(pos) {
            return None;
        }
        let index = self.chunk_index(self.chunk_type.calc_chunk_pos(pos))?;
        Some((index, self.chunk_type.calc_block_pos(pos)))
    }

    /// The chunk at a local chunk position (the origin chunk is `IVec3::ZERO`).
    pub fn chunk(&self, local_chunk: IVec3) -> Option<&Arc<Chunk>> {
        self.chunk_index(local_chunk).map(|i| &self.chunks[i])
    }

    pub fn chunk_data(&self, local_chunk: IVec3) -> Option<&ChunkData> {
        self.chunk_index(local_chunk).map(|i| &*self.guards[i])
    }

    pub fn chunk_data_mut(&mut self, local_chunk: IVec3) -> Option<&mut ChunkData> {
        self.chunk_index(local_chunk).map(|i| &mut *self.guards[i])
    }

    pub fn get_block(&self, pos: IVec3) -> BlockId {
        self.locate(pos)
            .map_or(BlockId::AIR, |(i, local)| self.guards[i].get_block(local))
    }

    /// Definition of the block at `pos`; air outside the view.
    pub fn block_def(&self, pos: IVec3) -> &BlockDef {
        let context = self.guards[0].context();
        match self.locate(pos) {
            Some((i, local)) => self.guards[i].block_def(local),
            None => context.blocks.get(BlockId::AIR),
        }
    }

    pub fn set_block(&mut self, pos: IVec3, block: BlockId) -> bool {
        match self.locate(pos) {
            Some((i, local)) => self.guards[i].set_block(local, block),
            None => false,
        }
    }

    pub fn set_block_if(&mut self, pos: IVec3, block: BlockId, expected: BlockId) -> bool {
        match self.locate(pos) {
            Some((i, local)) => self.guards[i].set_block_if(local, block, expected),
            None => false,
        }
    }

    pub fn get_sunlight(&self, pos: IVec3) -> u8 {
        self.locate(pos)
            .map_or(0, |(i, local)| self.guards[i].get_sunlight(local))
    }

    pub fn set_sunlight(&mut self, pos: IVec3, value: u8) -> Result<bool, ChunkError> {
        match self.locate(pos) {
            Some((i, local)) => self.guards[i].set_sunlight(local, value),
            None => Ok(false),
        }
    }

    pub fn get_light(&self, pos: IVec3) -> u8 {
        self.locate(pos)
            .map_or(0, |(i, local)| self.guards[i].get_light(local))
    }

    pub fn set_light(&mut self, pos: IVec3, value: u8) -> Result<bool, ChunkError> {
        match self.locate(pos) {
            Some((i, local)) => self.guards[i].set_light(local, value),
            None => Ok(false),
        }
    }

    pub fn get_extra(&self, pos: IVec3) -> u8 {
        self.locate(pos)
            .map_or(0, |(i, local)| self.guards[i].get_extra(local))
    }

    pub fn set_extra_if(&mut self, pos: IVec3, value: u8, expected: u8) -> bool {
        match self.locate(pos) {
            Some((i, local)) => self.guards[i].set_extra_if(local, value, expected),
            None => false,
        }
    }

    /// Marks every chunk within one block of `pos` dirty.
    pub fn set_dirty_around(&self, pos: IVec3) {
        for local_chunk in self.chunk_type.chunk_region_around_block(pos, 1) {
            if let Some(chunk) = self.chunk(local_chunk) {
                chunk.set_dirty(true);
            }
        }
    }

    /// Converts a local block position to a world block position.
    pub fn to_world_pos(&self, local: IVec3) -> IVec3 {
        let size = self.chunk_type.size();
        let origin = (self.offset + self.chunk_region.min()) * size;
        if self.chunk_type.is_stackable() {
            local + origin
        } else {
            IVec3::new(local.x + origin.x, local.y, local.z + origin.z)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
