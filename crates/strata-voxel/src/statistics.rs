use glam::IVec3;
use rustc_hash::FxHashMap;

use crate::block::BlockId;
use crate::chunk::ChunkData;

/// Block occurrence counts of one chunk.
#[derive(Clone, Debug)]
pub struct ChunkStatistics {
    chunk: IVec3,
    counts: FxHashMap<BlockId, usize>,
    runs: usize,
}

impl ChunkStatistics {
    /// Walks the block array in storage order, counting runs of equal ids.
    pub fn collect(data: &ChunkData) -> Self {
        let size = data.size();
        let mut counts: FxHashMap<BlockId, usize> = FxHashMap::default();
        let mut runs = 0;
        let mut current: Option<(BlockId, usize)> = None;

        for y in 0..size.y as i32 {
            for z in 0..size.z as i32 {
                for x in 0..size.x as i32 {
                    let block = data.get_block(IVec3::new(x, y, z));
                    current = match current {
                        Some((last, count)) if last == block => Some((last, count + 1)),
                        Some((last, count)) => {
                            *counts.entry(last).or_default() += count;
                            runs += 1;
                            Some((block, 1))
                        }
                        None => Some((block, 1)),
                    };
                }
            }
        }
        if let Some((last, count)) = current {
            *counts.entry(last).or_default() += count;
            runs += 1;
        }

        Self {
            chunk: data.pos(),
            counts,
            runs,
        }
    }

    pub fn chunk(&self) -> IVec3 {
        self.chunk
    }

    /// Ids present in the chunk.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.counts.keys().copied()
    }

    pub fn occurrences(&self, block: BlockId) -> usize {
        self.counts.get(&block).copied().unwrap_or(0)
    }

    /// Number of runs of equal consecutive ids in storage order.
    pub fn runs(&self) -> usize {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::chunk::Chunk;
    use crate::chunk_type::ChunkType;
    use crate::context::ChunkContext;

    use super::*;

    #[test]
    fn test_counts_layers() {
        let context = Arc::new(ChunkContext::with_defaults());
        let stone = context.blocks.id_or_air("stone");
        let chunk = Chunk::new(IVec3::ZERO, ChunkType::Stackable, Arc::clone(&context));
        {
            let mut data = chunk.lock();
            for z in 0..16 {
                for x in 0..16 {
                    data.set_block(IVec3::new(x, 0, z), stone);
                }
            }
        }
        let stats = chunk.statistics();
        assert_eq!(stats.chunk(), IVec3::ZERO);
        assert_eq!(stats.occurrences(stone), 256);
        assert_eq!(stats.occurrences(BlockId::AIR), 16 * 16 * 15);
        assert_eq!(stats.runs(), 2);
        let mut blocks: Vec<_> = stats.blocks().collect();
        blocks.sort_by_key(|b| b.0);
        assert_eq!(blocks, vec![BlockId::AIR, stone]);
    }
}
