//! Initial lighting of a single chunk.
//!
//! The chunk is treated as a blank slate open to the sky: sunlight tunnels
//! straight down each column at full strength, then both channels flood
//! outward with -1 decay per step. Nothing leaves the chunk; the boundary
//! pass handles neighbors.

use std::sync::Arc;

use glam::IVec3;
use strata_math::Side;
use strata_voxel::{BlockId, BlockRegistry, ChunkData, ChunkError, MAX_LIGHT};

use crate::rules::{can_spread_light_into, can_spread_light_out_of, sunlight_retains_full_strength};

/// Lights `data` from scratch. The caller holds the chunk lock.
pub fn generate_internal_lighting(data: &mut ChunkData) -> Result<(), ChunkError> {
    let context = Arc::clone(data.context());
    let blocks = &context.blocks;
    let size = data.size();
    let (sx, sy, sz) = (size.x as i32, size.y as i32, size.z as i32);
    let top = sy - 1;

    // Height of the first block that stopped the sun in each column, -1 if none did.
    let mut tops = vec![-1i32; size.layer_area()];
    let column = |x: i32, z: i32| (x + sx * z) as usize;

    for z in 0..sz {
        for x in 0..sx {
            let mut last = blocks.get(BlockId::AIR);
            let mut y = top;
            while y >= 0 {
                let pos = IVec3::new(x, y, z);
                let block = blocks.get(data.get_block(pos));
                if !(sunlight_retains_full_strength(block)
                    && can_spread_light_out_of(last, Side::Bottom)
                    && can_spread_light_into(block, Side::Top))
                {
                    break;
                }
                data.set_sunlight(pos, MAX_LIGHT)?;
                last = block;
                y -= 1;
            }
            tops[column(x, z)] = y;
        }
    }

    let mut stack = Vec::new();
    for z in 0..sz {
        for x in 0..sx {
            let column_top = tops[column(x, z)];
            if column_top < top {
                stack.push(IVec3::new(x, column_top + 1, z));
                spread_sunlight(data, blocks, &mut stack)?;
            }
            for y in (0..sy).rev() {
                let pos = IVec3::new(x, y, z);
                let shadowed_neighbor = (x > 0 && tops[column(x - 1, z)] >= y)
                    || (x < sx - 1 && tops[column(x + 1, z)] >= y)
                    || (z > 0 && tops[column(x, z - 1)] >= y)
                    || (z < sz - 1 && tops[column(x, z + 1)] >= y);
                if y > column_top && shadowed_neighbor {
                    stack.push(pos);
                    spread_sunlight(data, blocks, &mut stack)?;
                }
                let luminance = blocks.get(data.get_block(pos)).luminance;
                if luminance > 0 {
                    data.set_light(pos, luminance)?;
                    stack.push(pos);
                    spread_light(data, blocks, &mut stack)?;
                }
            }
        }
    }
    Ok(())
}

fn spread_light(
    data: &mut ChunkData,
    blocks: &BlockRegistry,
    stack: &mut Vec<IVec3>,
) -> Result<(), ChunkError> {
    while let Some(pos) = stack.pop() {
        let value = data.get_light(pos);
        if value <= 1 {
            continue;
        }
        let block = blocks.get(data.get_block(pos));
        for side in Side::ALL {
            let adj = pos + side.vector();
            if !data.is_in_bounds(adj) {
                continue;
            }
            let adj_block = blocks.get(data.get_block(adj));
            if data.get_light(adj) < value - 1
                && can_spread_light_out_of(block, side)
                && can_spread_light_into(adj_block, side.reverse())
            {
                data.set_light(adj, value - 1)?;
                stack.push(adj);
            }
        }
    }
    Ok(())
}

fn spread_sunlight(
    data: &mut ChunkData,
    blocks: &BlockRegistry,
    stack: &mut Vec<IVec3>,
) -> Result<(), ChunkError> {
    while let Some(pos) = stack.pop() {
        let value = data.get_sunlight(pos);
        let next = value.saturating_sub(1);
        let block = blocks.get(data.get_block(pos));

        let mut try_step = |data: &mut ChunkData, side: Side| -> Result<(), ChunkError> {
            let adj = pos + side.vector();
            if !data.is_in_bounds(adj) || !can_spread_light_out_of(block, side) {
                return Ok(());
            }
            let adj_block = blocks.get(data.get_block(adj));
            if data.get_sunlight(adj) < next && can_spread_light_into(adj_block, side.reverse()) {
                data.set_sunlight(adj, next)?;
                stack.push(adj);
            }
            Ok(())
        };

        try_step(data, Side::Bottom)?;
        if value < MAX_LIGHT {
            try_step(data, Side::Top)?;
        }
        if value > 1 {
            for side in Side::HORIZONTAL {
                try_step(data, side)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
