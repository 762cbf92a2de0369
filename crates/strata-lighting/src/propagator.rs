//! Cross-chunk light propagation over a locked world view.

use std::sync::Arc;

use glam::IVec3;
use strata_math::Side;
use strata_voxel::{BlockRegistry, ChunkError, MAX_LIGHT, WorldView};
use tracing::trace;

use crate::rules::{can_spread_light_into, can_spread_light_out_of, sunlight_retains_full_strength};

#[derive(Clone, Copy)]
enum Channel {
    Sunlight,
    Light,
}

impl Channel {
    fn get(self, view: &WorldView<'_>, pos: IVec3) -> u8 {
        match self {
            Channel::Sunlight => view.get_sunlight(pos),
            Channel::Light => view.get_light(pos),
        }
    }

    fn set(self, view: &mut WorldView<'_>, pos: IVec3, value: u8) -> Result<bool, ChunkError> {
        match self {
            Channel::Sunlight => view.set_sunlight(pos, value),
            Channel::Light => view.set_light(pos, value),
        }
    }
}

/// Pushes the light of the view's origin chunk out into its neighbors.
///
/// Every lit block of the origin chunk seeds the flood, which may cross
/// into any chunk of the view. Values only ever rise. Returns the number of
/// cells whose light changed.
pub fn propagate_boundary_light(view: &mut WorldView<'_>) -> Result<usize, ChunkError> {
    let Some(origin) = view.chunk(IVec3::ZERO) else {
        return Ok(0);
    };
    let context = Arc::clone(origin.context());
    let size = view.chunk_type().size();

    let mut sun_seeds = Vec::new();
    let mut light_seeds = Vec::new();
    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                let pos = IVec3::new(x, y, z);
                if view.get_sunlight(pos) > 0 {
                    sun_seeds.push(pos);
                }
                if view.get_light(pos) > 0 {
                    light_seeds.push(pos);
                }
            }
        }
    }

    let changed = flood(view, &context.blocks, Channel::Sunlight, sun_seeds)?
        + flood(view, &context.blocks, Channel::Light, light_seeds)?;
    trace!(chunk = %origin_pos(view), changed, "boundary light propagated");
    Ok(changed)
}

fn origin_pos(view: &WorldView<'_>) -> IVec3 {
    view.chunk(IVec3::ZERO).map_or(IVec3::ZERO, |chunk| chunk.pos())
}

fn flood(
    view: &mut WorldView<'_>,
    blocks: &BlockRegistry,
    channel: Channel,
    mut stack: Vec<IVec3>,
) -> Result<usize, ChunkError> {
    let mut changed = 0;
    while let Some(pos) = stack.pop() {
        let value = channel.get(view, pos);
        if value == 0 {
            continue;
        }
        let block = blocks.get(view.get_block(pos));
        for side in Side::ALL {
            if matches!(channel, Channel::Sunlight) && side == Side::Top && value == MAX_LIGHT {
                continue;
            }
            let adj = pos + side.vector();
            if !view.is_in_bounds(adj) {
                continue;
            }
            let adj_block = blocks.get(view.get_block(adj));
            if !can_spread_light_out_of(block, side)
                || !can_spread_light_into(adj_block, side.reverse())
            {
                continue;
            }
            let next = match channel {
                Channel::Sunlight
                    if side == Side::Bottom
                        && value == MAX_LIGHT
                        && sunlight_retains_full_strength(adj_block) =>
                {
                    MAX_LIGHT
                }
                _ => value - 1,
            };
            if channel.get(view, adj) < next && channel.set(view, adj, next)? {
                changed += 1;
                stack.push(adj);
            }
        }
    }
    Ok(changed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_internal_lighting;
    use strata_math::Region3i;
    use strata_voxel::{Chunk, ChunkContext, ChunkType, ViewChunks};

    fn neighborhood(context: &Arc<ChunkContext>) -> Vec<Arc<Chunk>> {
        Region3i::from_center_extents(IVec3::ZERO, IVec3::ONE)
            .iter()
            .map(|pos| Arc::new(Chunk::new(pos, ChunkType::Stackable, Arc::clone(context))))
            .collect()
    }

    fn local_view(chunks: &[Arc<Chunk>]) -> ViewChunks {
        ViewChunks::local(IVec3::ZERO, ChunkType::Stackable, |pos| {
            chunks.iter().find(|c| c.pos() == pos).cloned()
        })
        .unwrap()
    }

    fn find(chunks: &[Arc<Chunk>], pos: IVec3) -> Arc<Chunk> {
        chunks.iter().find(|c| c.pos() == pos).cloned().unwrap()
    }

    #[test]
    fn test_light_crosses_chunk_face() {
        let context = Arc::new(ChunkContext::with_defaults());
        let lava = context.blocks.id_or_air("lava");
        let chunks = neighborhood(&context);
        let center = find(&chunks, IVec3::ZERO);
        {
            let mut data = center.lock();
            data.set_block(IVec3::new(15, 8, 8), lava);
            generate_internal_lighting(&mut data).unwrap();
        }

        let view_chunks = local_view(&chunks);
        let mut view = view_chunks.lock();
        assert!(propagate_boundary_light(&mut view).unwrap() > 0);
        assert_eq!(view.get_light(IVec3::new(15, 8, 8)), 15);
        assert_eq!(view.get_light(IVec3::new(16, 8, 8)), 14);
        assert_eq!(view.get_light(IVec3::new(17, 8, 8)), 13);
        assert_eq!(view.get_light(IVec3::new(18, 9, 8)), 11);
        drop(view);

        let east = find(&chunks, IVec3::new(1, 0, 0));
        assert_eq!(east.lock().get_light(IVec3::new(0, 8, 8)), 14);
    }

    #[test]
    fn test_full_sunlight_continues_into_chunk_below() {
        let context = Arc::new(ChunkContext::with_defaults());
        let chunks = neighborhood(&context);
        let center = find(&chunks, IVec3::ZERO);
        generate_internal_lighting(&mut center.lock()).unwrap();

        let view_chunks = local_view(&chunks);
        let mut view = view_chunks.lock();
        propagate_boundary_light(&mut view).unwrap();
        assert_eq!(view.get_sunlight(IVec3::new(3, -1, 3)), 15);
        assert_eq!(view.get_sunlight(IVec3::new(3, -16, 3)), 15);
        assert_eq!(view.get_sunlight(IVec3::new(-1, 5, 3)), 14);
        // Above the chunk, sunlight only arrives sideways from the lit flanks.
        assert_eq!(view.get_sunlight(IVec3::new(3, 16, 3)), 9);
    }

    #[test]
    fn test_values_never_lowered() {
        let context = Arc::new(ChunkContext::with_defaults());
        let lava = context.blocks.id_or_air("lava");
        let chunks = neighborhood(&context);
        let center = find(&chunks, IVec3::ZERO);
        {
            let mut data = center.lock();
            data.set_block(IVec3::new(15, 8, 8), lava);
            generate_internal_lighting(&mut data).unwrap();
        }
        find(&chunks, IVec3::new(1, 0, 0))
            .lock()
            .set_light(IVec3::new(1, 8, 8), 15)
            .unwrap();

        let view_chunks = local_view(&chunks);
        let mut view = view_chunks.lock();
        propagate_boundary_light(&mut view).unwrap();
        assert_eq!(view.get_light(IVec3::new(17, 8, 8)), 15);
        for pos in view.block_region() {
            assert!(view.get_light(pos) <= MAX_LIGHT);
            assert!(view.get_sunlight(pos) <= MAX_LIGHT);
        }
    }

    #[test]
    fn test_opaque_neighbor_stops_light() {
        let context = Arc::new(ChunkContext::with_defaults());
        let lava = context.blocks.id_or_air("lava");
        let stone = context.blocks.id_or_air("stone");
        let chunks = neighborhood(&context);
        let center = find(&chunks, IVec3::ZERO);
        {
            let mut data = center.lock();
            data.set_block(IVec3::new(15, 8, 8), lava);
            generate_internal_lighting(&mut data).unwrap();
        }
        find(&chunks, IVec3::new(1, 0, 0))
            .lock()
            .set_block(IVec3::new(0, 8, 8), stone);

        let view_chunks = local_view(&chunks);
        let mut view = view_chunks.lock();
        propagate_boundary_light(&mut view).unwrap();
        assert_eq!(view.get_light(IVec3::new(16, 8, 8)), 0);
        assert_eq!(view.get_light(IVec3::new(17, 8, 8)), 11);
    }
}
