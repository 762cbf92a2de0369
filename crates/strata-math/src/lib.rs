//! Integer volume math for the Strata voxel world: regions, sides and grid distances.

mod grid;
mod region;
mod side;

pub use glam::{IVec3, Vec3};
pub use grid::{ceil_to_int, floor_to_int, grid_distance};
pub use region::{Region3i, RegionIter};
pub use side::Side;
