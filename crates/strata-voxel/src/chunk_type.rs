//! Chunk shapes and block/chunk coordinate conversion.
//!
//! A world uses exactly one [`ChunkType`]. Stackable chunks tile the world in
//! all three axes; every other type is a single column in Y, so its chunk Y is
//! always 0 and block Y coordinates pass through unchanged.

use glam::IVec3;
use serde::{Deserialize, Serialize};
use strata_config::ChunkTypeName;
use strata_math::Region3i;

use crate::tera::ArraySize;

/// Shape of the chunks of a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkType {
    Classic,
    Small,
    Tall,
    Stackable,
    Miniature,
}

struct ChunkTypeInfo {
    size: IVec3,
    id: i32,
    stackable: bool,
}

const CHUNK_TYPE_TABLE: [ChunkTypeInfo; 5] = [
    ChunkTypeInfo {
        size: IVec3::new(16, 256, 16),
        id: 0,
        stackable: false,
    },
    ChunkTypeInfo {
        size: IVec3::new(16, 128, 16),
        id: 1,
        stackable: false,
    },
    ChunkTypeInfo {
        size: IVec3::new(16, 512, 16),
        id: 2,
        stackable: false,
    },
    ChunkTypeInfo {
        size: IVec3::new(16, 16, 16),
        id: 31,
        stackable: true,
    },
    ChunkTypeInfo {
        size: IVec3::new(512, 256, 512),
        id: 127,
        stackable: false,
    },
];

impl ChunkType {
    pub const ALL: [ChunkType; 5] = [
        ChunkType::Classic,
        ChunkType::Small,
        ChunkType::Tall,
        ChunkType::Stackable,
        ChunkType::Miniature,
    ];

    fn info(self) -> &'static ChunkTypeInfo {
        &CHUNK_TYPE_TABLE[self as usize]
    }

    /// Looks up a type by its persisted id.
    pub fn by_id(id: i32) -> Option<ChunkType> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Persisted id.
    pub fn id(self) -> i32 {
        self.info().id
    }

    /// Chunk dimensions in blocks.
    pub fn size(self) -> IVec3 {
        self.info().size
    }

    pub fn array_size(self) -> ArraySize {
        let size = self.size();
        ArraySize::new(size.x as usize, size.y as usize, size.z as usize)
    }

    pub fn is_stackable(self) -> bool {
        self.info().stackable
    }

    /// 1 for stackable types, 0 otherwise. Multiplies Y extents.
    pub fn f_stackable(self) -> i32 {
        i32::from(self.is_stackable())
    }

    /// log2 of the chunk size per axis; Y is 0 for non-stackable types.
    pub fn power(self) -> IVec3 {
        let size = self.size();
        IVec3::new(
            size.x.trailing_zeros() as i32,
            if self.is_stackable() {
                size.y.trailing_zeros() as i32
            } else {
                0
            },
            size.z.trailing_zeros() as i32,
        )
    }

    /// Mask extracting the in-chunk part of a block coordinate; Y is 0 for
    /// non-stackable types.
    pub fn filter(self) -> IVec3 {
        let size = self.size();
        IVec3::new(
            size.x - 1,
            if self.is_stackable() { size.y - 1 } else { 0 },
            size.z - 1,
        )
    }

    /// Chunk position containing a world block position.
    pub fn calc_chunk_pos(self, block: IVec3) -> IVec3 {
        let power = self.power();
        IVec3::new(
            block.x >> power.x,
            if self.is_stackable() { block.y >> power.y } else { 0 },
            block.z >> power.z,
        )
    }

    /// Position of a world block inside its chunk.
    pub fn calc_block_pos(self, block: IVec3) -> IVec3 {
        let filter = self.filter();
        IVec3::new(
            block.x & filter.x,
            if self.is_stackable() {
                block.y & filter.y
            } else {
                block.y
            },
            block.z & filter.z,
        )
    }

    /// `(n, n * f_stackable, n)`.
    pub fn chunk_extents(self, n: i32) -> IVec3 {
        IVec3::new(n, n * self.f_stackable(), n)
    }

    /// Chunk region covering every block within `extent` blocks of `block`.
    pub fn chunk_region_around_block(self, block: IVec3, extent: i32) -> Region3i {
        let extents = self.chunk_extents(extent);
        Region3i::from_min_max(
            self.calc_chunk_pos(block - extents),
            self.calc_chunk_pos(block + extents),
        )
    }

    /// Chunk region covering a block region grown by `extent` blocks.
    pub fn chunk_region_around_block_region(self, blocks: &Region3i, extent: i32) -> Region3i {
        let extents = self.chunk_extents(extent);
        Region3i::from_min_max(
            self.calc_chunk_pos(blocks.min() - extents),
            self.calc_chunk_pos(blocks.max() + extents),
        )
    }
}

impl From<ChunkTypeName> for ChunkType {
    fn from(name: ChunkTypeName) -> Self {
        match name {
            ChunkTypeName::Classic => ChunkType::Classic,
            ChunkTypeName::Small => ChunkType::Small,
            ChunkTypeName::Tall => ChunkType::Tall,
            ChunkTypeName::Stackable => ChunkType::Stackable,
            ChunkTypeName::Miniature => ChunkType::Miniature,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_roundtrip() {
        for chunk_type in ChunkType::ALL {
            assert_eq!(ChunkType::by_id(chunk_type.id()), Some(chunk_type));
        }
        assert_eq!(ChunkType::by_id(31), Some(ChunkType::Stackable));
        assert_eq!(ChunkType::by_id(3), None);
    }

    #[test]
    fn test_powers_and_filters() {
        assert_eq!(ChunkType::Classic.power(), IVec3::new(4, 0, 4));
        assert_eq!(ChunkType::Classic.filter(), IVec3::new(15, 0, 15));
        assert_eq!(ChunkType::Stackable.power(), IVec3::new(4, 4, 4));
        assert_eq!(ChunkType::Miniature.power(), IVec3::new(9, 0, 9));
        assert_eq!(ChunkType::Miniature.filter(), IVec3::new(511, 0, 511));
    }

    #[test]
    fn test_negative_block_positions() {
        let t = ChunkType::Stackable;
        assert_eq!(t.calc_chunk_pos(IVec3::new(-1, -16, -17)), IVec3::new(-1, -1, -2));
        assert_eq!(t.calc_block_pos(IVec3::new(-1, -16, -17)), IVec3::new(15, 0, 15));
    }

    #[test]
    fn test_non_stackable_y_passes_through() {
        let t = ChunkType::Classic;
        assert_eq!(t.calc_chunk_pos(IVec3::new(20, 300, 5)), IVec3::new(1, 0, 0));
        assert_eq!(t.calc_block_pos(IVec3::new(20, 300, 5)), IVec3::new(4, 300, 5));
    }

    #[test]
    fn test_extents() {
        assert_eq!(ChunkType::Classic.chunk_extents(2), IVec3::new(2, 0, 2));
        assert_eq!(ChunkType::Stackable.chunk_extents(2), IVec3::new(2, 2, 2));
    }

    #[test]
    fn test_region_around_block() {
        let region = ChunkType::Stackable.chunk_region_around_block(IVec3::new(15, 0, 8), 1);
        assert_eq!(region.min(), IVec3::new(0, -1, 0));
        assert_eq!(region.max(), IVec3::new(1, 0, 0));

        let region = ChunkType::Classic.chunk_region_around_block(IVec3::new(0, 40, 0), 1);
        assert_eq!(region.min(), IVec3::new(-1, 0, -1));
        assert_eq!(region.max(), IVec3::new(0, 0, 0));
    }

    #[test]
    fn test_from_config_name() {
        assert_eq!(ChunkType::from(ChunkTypeName::Tall), ChunkType::Tall);
        assert_eq!(ChunkType::from(ChunkTypeName::Tall).size().y, 512);
    }
}
