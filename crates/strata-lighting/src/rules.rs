//! Face rules deciding where light may travel.

use strata_math::Side;
use strata_voxel::BlockDef;

/// Sunlight passing straight down through this block keeps full strength.
pub fn sunlight_retains_full_strength(block: &BlockDef) -> bool {
    block.translucent && !block.liquid
}

pub fn can_spread_light_out_of(block: &BlockDef, side: Side) -> bool {
    block.translucent || !block.shape.is_full_side(side)
}

pub fn can_spread_light_into(block: &BlockDef, side: Side) -> bool {
    block.translucent || !block.shape.is_full_side(side)
}
